//! Candidate address generation
//!
//! A base address and a subnet size are expanded into the host addresses of
//! the surrounding block. Network (`.0`) and broadcast (`.255`) addresses
//! are never produced. `/31` is the point-to-point convention and yields the
//! base unchanged.
//!
//! Small subnet sizes get large quickly: `/16` is 256 × 254 = 65,024
//! candidates per base. Choosing concurrency and timeout accordingly is up
//! to the caller.

use std::net::{IpAddr, Ipv4Addr};

use crate::ScanError;

/// Smallest supported subnet size
pub const MIN_SUBNET: u8 = 16;
/// Largest supported subnet size
pub const MAX_SUBNET: u8 = 32;
/// Point-to-point subnet size: only the base itself is scanned
pub const POINT_TO_POINT: u8 = 31;

/// Number of candidates produced per base for a subnet size
pub fn candidates_per_base(subnet: u8) -> crate::Result<usize> {
    validate_subnet(subnet)?;
    Ok(if subnet == POINT_TO_POINT {
        1
    } else {
        block_count(subnet) * 254
    })
}

/// Expand one base address
pub fn expand(base: IpAddr, subnet: u8) -> crate::Result<Vec<IpAddr>> {
    expand_all(std::iter::once(base), subnet)
}

/// Expand several base addresses independently and concatenate the results
/// in input order. A base that cannot be synthesized into candidates is
/// dropped; the rest of the batch continues.
pub fn expand_all<I>(bases: I, subnet: u8) -> crate::Result<Vec<IpAddr>>
where
    I: IntoIterator<Item = IpAddr>,
{
    validate_subnet(subnet)?;

    let mut candidates = Vec::new();
    for base in bases {
        if subnet == POINT_TO_POINT {
            candidates.push(base);
            continue;
        }

        match base {
            IpAddr::V4(v4) => push_block(&mut candidates, v4, subnet),
            IpAddr::V6(v6) => {
                log::debug!("cannot synthesize /{} candidates from {}, skipping", subnet, v6);
            }
        }
    }

    log::debug!("expanded bases with /{} to {} candidates", subnet, candidates.len());
    Ok(candidates)
}

fn validate_subnet(subnet: u8) -> crate::Result<()> {
    if (MIN_SUBNET..=MAX_SUBNET).contains(&subnet) {
        Ok(())
    } else {
        Err(ScanError::InvalidSubnet(subnet))
    }
}

/// Number of /24 blocks covered; sizes above 24 scan the base's own block
fn block_count(subnet: u8) -> usize {
    if subnet < 24 {
        1 << (24 - subnet)
    } else {
        1
    }
}

fn push_block(out: &mut Vec<IpAddr>, base: Ipv4Addr, subnet: u8) {
    let octets = base.octets();
    let third_octets = if subnet >= 24 {
        octets[2]..=octets[2]
    } else {
        0..=(block_count(subnet) - 1) as u8
    };

    out.reserve(block_count(subnet) * 254);
    for third in third_octets {
        for fourth in 1..=254u8 {
            out.push(IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], third, fourth)));
        }
    }
}
