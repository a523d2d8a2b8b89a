//! `--clean`: forget the cached sign-in.

use std::io::Write;
use std::path::Path;

use calsweep_providers::TokenCache;

use crate::error::ClientResult;

/// Deletes the token cache file. A missing file is not an error.
pub fn run(path: &Path, out: &mut impl Write) -> ClientResult<()> {
    let removed = TokenCache::new(path).clear()?;
    if removed {
        writeln!(out, "Token cache cleaned.")?;
    } else {
        writeln!(out, "No token cache at {}.", path.display())?;
    }
    Ok(())
}
