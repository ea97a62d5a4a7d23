pub mod audit_log_repository;
pub mod audit_log_service;
pub mod credential_encryption_service;
pub mod errors;
pub mod events;
pub mod http_context;
pub mod mfa_service;
pub mod model;
pub mod password_management;
pub mod registration;
pub mod repository;
pub mod security_facade;
pub mod service;
pub mod session_cache;
pub mod session_manager;
pub mod strategies;
pub mod tenant_resolver;
pub mod token_service;
pub mod verification_token_repository;
