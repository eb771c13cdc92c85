// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Address Assignment
//!
//! Over pairwise-disjoint pools, assignment hands out every usable host
//! exactly once and then reports exhaustion.

use cim_dcim_allocation::config::AllocationConfig;
use cim_dcim_allocation::domain::CidrBlock;
use cim_dcim_allocation::errors::AllocationError;
use cim_dcim_allocation::service::AllocationServices;
use cim_dcim_allocation::store::MemoryStore;
use proptest::prelude::*;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// Prefix lengths with at least two usable hosts, kept small so runs are fast
fn prefixes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(27u8..=30, 1..4)
}

fn disjoint_blocks(prefixes: &[u8]) -> Vec<CidrBlock> {
    prefixes
        .iter()
        .enumerate()
        .map(|(i, &prefix)| {
            let network = IpAddr::V4(Ipv4Addr::new(10, 0, i as u8, 0));
            CidrBlock::from_parts(network, prefix).expect("valid block")
        })
        .collect()
}

proptest! {
    #[test]
    fn assign_never_repeats_and_then_exhausts(prefixes in prefixes()) {
        let blocks = disjoint_blocks(&prefixes);
        let usable: u128 = blocks.iter().map(CidrBlock::usable_count).sum();

        let outcome = tokio_test::block_on(async {
            let services =
                AllocationServices::new(Arc::new(MemoryStore::new()), AllocationConfig::default());
            for block in &blocks {
                services.pools.create_pool("web", *block).await?;
            }

            let mut seen = HashSet::new();
            for _ in 0..usable {
                let assignment = services.pools.assign("web").await?;
                seen.insert(assignment.address);
            }
            let after = services.pools.assign("web").await;
            Ok::<_, AllocationError>((seen, after))
        });

        let (seen, after) = outcome.expect("allocation setup");
        prop_assert_eq!(seen.len() as u128, usable);
        for address in &seen {
            prop_assert!(blocks.iter().any(|block| block.is_usable_host(address)));
        }
        prop_assert!(
            matches!(after, Err(AllocationError::ResourceExhausted { .. })),
            "expected exhaustion"
        );
    }

    #[test]
    fn overlap_matches_address_ranges(
        a_prefix in 24u8..=32,
        a_offset in 0u8..=255,
        b_prefix in 24u8..=32,
        b_offset in 0u8..=255,
    ) {
        let a = CidrBlock::from_parts(IpAddr::V4(Ipv4Addr::new(10, 0, 0, a_offset)), a_prefix)
            .expect("valid block");
        let b = CidrBlock::from_parts(IpAddr::V4(Ipv4Addr::new(10, 0, 0, b_offset)), b_prefix)
            .expect("valid block");

        let a_set: HashSet<IpAddr> = a.addresses().collect();
        let shared = b.addresses().any(|address| a_set.contains(&address));
        prop_assert_eq!(a.overlaps(&b), shared);
        prop_assert_eq!(b.overlaps(&a), shared);
    }
}
