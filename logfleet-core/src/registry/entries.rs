use logfleet_model::WorkerRegistration;

use super::UpsertOutcome;

/// Apply the loose-match upsert rule to an in-memory list.
///
/// The first entry sharing a name or url with `incoming` is replaced in
/// place. Any later entry that also collides is dropped so that no two
/// entries share a name or a url afterwards.
pub fn apply_upsert(
    entries: &mut Vec<WorkerRegistration>,
    incoming: WorkerRegistration,
) -> UpsertOutcome {
    let Some(slot) = entries.iter().position(|entry| entry.same_worker(&incoming))
    else {
        entries.push(incoming);
        return UpsertOutcome::Inserted;
    };

    let mut index = 0;
    entries.retain(|entry| {
        let keep = index <= slot || !entry.same_worker(&incoming);
        index += 1;
        keep
    });
    entries[slot] = incoming;
    UpsertOutcome::Replaced(slot)
}

/// Remove the first entry matching `identifier` by name or url.
pub fn apply_remove(
    entries: &mut Vec<WorkerRegistration>,
    identifier: &str,
) -> Option<WorkerRegistration> {
    let position = entries.iter().position(|entry| entry.matches(identifier))?;
    Some(entries.remove(position))
}
