//! Grouping of time steps by branch switching state.

use std::collections::{BTreeMap, HashMap};

use gridsplit_core::Profile;

/// Pack a row of flags into 64-bit words.
fn pack(row: &[bool]) -> Vec<u64> {
    row.chunks(64)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |word, (bit, &on)| word | (u64::from(on) << bit))
        })
        .collect()
}

/// Group time steps whose rows of `active_prof` are identical.
///
/// Keys are the first time step of each class; every step appears in
/// exactly one class, in ascending order.
pub fn group_states(active_prof: &Profile<bool>) -> BTreeMap<usize, Vec<usize>> {
    let mut representative: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut states: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (t, row) in active_prof.rows().enumerate() {
        let key = *representative.entry(pack(row)).or_insert(t);
        states.entry(key).or_default().push(t);
    }
    states
}
