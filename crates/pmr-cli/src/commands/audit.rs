//! `pmr audit verify`.

use std::path::Path;

use anyhow::Result;
use pmr_audit::{verify_hash_chain, VerifyResult};

use super::{EXIT_OK, EXIT_PASS_FAILED};

pub fn verify(path: &Path) -> Result<u8> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_ok=true lines={lines}");
            Ok(EXIT_OK)
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_ok=false line={line} reason={reason}");
            Ok(EXIT_PASS_FAILED)
        }
    }
}
