use std::collections::HashMap;

use crate::record::PartRecord;

/// Give every part whose persisted name is shared with other parts a 1-based
/// positional suffix, counted in document order.
///
/// Only `proposed_name` is written. Because the decision is keyed off
/// `current_name`, running this again before a save produces the same result.
/// Returns how many records were numbered.
pub fn apply_bulk_numbering(records: &mut [PartRecord]) -> usize {
    let mut totals: HashMap<String, usize> = HashMap::new();
    for record in records.iter() {
        *totals.entry(record.current_name.clone()).or_default() += 1;
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut numbered = 0;
    for record in records.iter_mut() {
        if totals[&record.current_name] < 2 {
            continue;
        }
        let position = positions.entry(record.current_name.clone()).or_default();
        *position += 1;
        record.proposed_name = format!("{} {}", record.current_name, position);
        numbered += 1;
    }

    numbered
}
