use crate::ConnectionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Same address, seen inside the window: stay quiet.
    Suppress,
    Notify,
}

/// Decide whether a connection deserves a notification.
///
/// Suppresses only when the previous record has the exact same address and
/// `current.time - previous.time < window_secs`. The caller refreshes the
/// stored record whichever way this goes, so repeated connections from one
/// address keep sliding the window forward.
#[must_use]
pub fn decide(
    previous: Option<&ConnectionRecord>,
    current: &ConnectionRecord,
    window_secs: u64,
) -> Decision {
    let Some(previous) = previous else {
        return Decision::Notify;
    };
    if previous.address != current.address {
        return Decision::Notify;
    }
    let elapsed = i128::from(current.time) - i128::from(previous.time);
    if elapsed < i128::from(window_secs) {
        Decision::Suppress
    } else {
        Decision::Notify
    }
}
