//! Applying the override table to a holder list.

use std::collections::BTreeMap;

use hongbao_types::Address;

use crate::AddressMapping;

/// One holder paired with the destination that actually receives its funds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRecipient {
    /// The original reward-eligible holder.
    pub holder: Address,
    /// The payout destination (override, or the holder itself).
    pub destination: Address,
}

/// Outcome of resolution, including the non-fatal anomalies observed.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// One entry per input holder, in input order.
    pub recipients: Vec<ResolvedRecipient>,
    /// How many holders were remapped by the override table.
    pub mapped_count: usize,
    /// Destinations that receive on behalf of more than one distinct
    /// holder, with the holder count. One entry per such destination.
    pub collisions: Vec<(Address, usize)>,
}

/// Resolve each holder to its payout destination, preserving input order.
///
/// Resolution is deterministic: the same holders and table always produce
/// the same assignments. A destination receiving for multiple distinct
/// holders is legitimate (payout consolidation) but noteworthy, so each
/// such destination is reported once in [`Resolution::collisions`] and
/// logged as a warning.
pub fn resolve(holders: &[Address], mapping: &AddressMapping) -> Resolution {
    let mut recipients = Vec::with_capacity(holders.len());
    let mut mapped_count = 0;
    let mut sources_by_destination: BTreeMap<Address, Vec<Address>> = BTreeMap::new();

    for holder in holders {
        let destination = match mapping.get(holder) {
            Some(destination) => {
                mapped_count += 1;
                tracing::info!(%holder, %destination, "holder remapped");
                *destination
            }
            None => *holder,
        };
        sources_by_destination
            .entry(destination)
            .or_default()
            .push(*holder);
        recipients.push(ResolvedRecipient {
            holder: *holder,
            destination,
        });
    }

    let mut collisions = Vec::new();
    for (destination, sources) in &sources_by_destination {
        let mut distinct = sources.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 1 {
            tracing::warn!(
                %destination,
                holders = ?sources,
                "multiple holders resolve to the same destination"
            );
            collisions.push((*destination, distinct.len()));
        }
    }

    tracing::info!(
        mapped = mapped_count,
        total = holders.len(),
        "address mapping applied"
    );

    Resolution {
        recipients,
        mapped_count,
        collisions,
    }
}
