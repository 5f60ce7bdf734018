// handlers/mod.rs - Handlers grouped by security tier
//
// Public (no auth) → Elevated (operator JWT)
//
// Public endpoints serve anonymous visitors erasing their own consent
// session; they are guarded by the arithmetic challenge instead of a token.
// Elevated endpoints are for support operators acting on behalf of a client
// account and sit behind `operator_auth_middleware`.

pub mod elevated; // Tier 2: Operator JWT required (/api/erasure/*)
pub mod public; // Tier 1: No authentication required (/public/erasure/*)
