// handlers/elevated/mod.rs - Operator handlers (operator JWT required)
//
// Security Level: JWT whose `access` claim equals the configured operator access
// Route Prefix: /api/erasure
// Middleware: operator_auth_middleware

pub mod erasure;
