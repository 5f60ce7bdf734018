// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None, gated by challenge answers and progressive lockout
// Route Prefix: /public
// Middleware: None

pub mod erasure;
