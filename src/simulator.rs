//! Driver helpers shared by the `simulator` and `two-way-simulator`
//! binaries: payload loading, host construction, and the transmission
//! report.

use std::fs;

use crate::error::LinkError;
use crate::host::Host;
use crate::medium;

/// Read a whole payload file into memory.
///
/// An unreadable file fails with [`LinkError::Io`]; a file larger than the
/// simulator is prepared to buffer (2³¹ − 1 bytes) fails with
/// [`LinkError::FileTooLarge`].
pub fn read_payload(path: &str) -> Result<Vec<u8>, LinkError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > i32::MAX as u64 {
        return Err(LinkError::FileTooLarge(path.to_string()));
    }
    Ok(fs::read(path)?)
}

/// Build two hosts sharing one medium, both running the given data link
/// variant.
pub fn host_pair(medium_type: &str, link_type: &str) -> Result<(Host, Host), LinkError> {
    let medium = medium::create(medium_type)?;
    let a = Host::new(&medium, link_type)?;
    let b = Host::new(&medium, link_type)?;
    Ok((a, b))
}

/// Print whether `received` matches `sent` and return the verdict.
pub fn report(sent: &[u8], received: &[u8]) -> bool {
    if sent == received {
        println!("Transmission match");
        true
    } else {
        println!("Transmission mismatch");
        println!(
            "\tsent length = {}\treceived length = {}",
            sent.len(),
            received.len()
        );
        false
    }
}
