//! Stable condition digests (versioned).
//!
//! Decision records handed to code generation must be joinable back to the
//! condition they describe across separate compiler runs, so each goal gets
//! a deterministic identifier computed over its canonical text.
//!
//! - algorithm: **FNV-1a 64-bit**
//! - input: the canonical rendering of the expression (`Expr::canonical`)
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! This digest is **not** a security primitive; it is an identity tool.

use crate::expr::Expr;

/// Prefix used in serialized goal digests.
pub const GOAL_DIGEST_V1_PREFIX: &str = "fnv1a64:";

/// Prefix used in serialized fact-set digests.
pub const FACT_SET_DIGEST_V1_PREFIX: &str = "factsfnv1a64:";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

fn add(hash: &mut u64, bytes: &[u8]) {
    for b in bytes {
        *hash ^= (*b) as u64;
        *hash = hash.wrapping_mul(FNV_PRIME);
    }
}

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    add(&mut hash, bytes);
    format!("{GOAL_DIGEST_V1_PREFIX}{hash:016x}")
}

/// Digest of a goal; `x < 5` and `5 > x` share a digest.
pub fn goal_digest_v1(goal: &Expr) -> String {
    fnv1a64_digest_bytes(goal.canonical().to_string().as_bytes())
}

/// Digest of an assumption set, independent of fact order.
///
/// `facts` are `(variable, predicate)` pairs.
pub fn fact_set_digest_v1<'a>(facts: impl IntoIterator<Item = (&'a str, &'a Expr)>) -> String {
    let mut rendered: Vec<String> = facts
        .into_iter()
        .map(|(var, pred)| format!("{var}|{}", pred.canonical()))
        .collect();
    rendered.sort();

    let mut hash = FNV_OFFSET_BASIS;
    for r in &rendered {
        add(&mut hash, r.as_bytes());
        add(&mut hash, b";");
    }
    format!("{FACT_SET_DIGEST_V1_PREFIX}{hash:016x}")
}
