// ── Channel navigation ──
//
// Pure target computation over one channel snapshot. Ids may be sparse
// (deleted channels leave gaps), so every step scans for the next id
// that actually exists. The gateway worker applies the result.

use std::fmt::Write as _;

/// One channel as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u32,
    pub name: String,
    /// 0 for the root and its direct children.
    pub parent_id: u32,
    pub user_count: usize,
}

/// Ordered channel list fetched fresh for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    channels: Vec<ChannelInfo>,
}

/// Result of a navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to this channel id.
    Move(u32),
    /// Already at the edge; nothing to do.
    Boundary,
}

impl ChannelSnapshot {
    pub fn new(mut channels: Vec<ChannelInfo>) -> Self {
        channels.sort_by_key(|c| c.id);
        channels.dedup_by_key(|c| c.id);
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Highest channel id, 0 for an empty snapshot.
    pub fn max_id(&self) -> u32 {
        self.channels.last().map_or(0, |c| c.id)
    }

    pub fn get(&self, id: u32) -> Option<&ChannelInfo> {
        self.channels
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .and_then(|i| self.channels.get(i))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// First existing channel with id in `[from, max_id]`.
    pub fn first_at_or_above(&self, from: u32) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.id >= from)
    }

    /// First existing channel with id in `[0, from]`, scanning downward.
    pub fn first_at_or_below(&self, from: u32) -> Option<&ChannelInfo> {
        self.channels.iter().rev().find(|c| c.id <= from)
    }

    /// Next channel up from `current`, continuing from `anchor` when it
    /// is ahead (a previous attempt was denied).
    pub fn step_up(&self, current: u32, anchor: u32) -> Step {
        if current >= self.max_id() {
            return Step::Boundary;
        }
        let from = anchor.max(current).saturating_add(1);
        self.first_at_or_above(from)
            .map_or(Step::Boundary, |c| Step::Move(c.id))
    }

    /// Next channel down from `current`, continuing from `anchor` when
    /// it is behind. The root itself is handled by the caller.
    pub fn step_down(&self, current: u32, anchor: u32) -> Step {
        if current == 0 {
            return Step::Boundary;
        }
        let start = if anchor == 0 { current } else { anchor.min(current) };
        let Some(from) = start.checked_sub(1) else {
            return Step::Boundary;
        };
        self.first_at_or_below(from)
            .map_or(Step::Boundary, |c| Step::Move(c.id))
    }

    /// Parent/child listing, one line per channel.
    pub fn listing(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| {
                let mut line = String::new();
                if c.id == 0 || c.parent_id == 0 {
                    let _ = write!(
                        line,
                        "Parent -> ID={:>2} | Name={:<12} ({}) Users",
                        c.id, c.name, c.user_count
                    );
                } else {
                    let parent = self.get(c.parent_id).map_or("?", |p| p.name.as_str());
                    let _ = write!(
                        line,
                        "Child  -> ID={:>2} | Name={:<12} ({}) Users | PID={:>2} | PName={}",
                        c.id, c.name, c.user_count, c.parent_id, parent
                    );
                }
                line
            })
            .collect()
    }
}

impl FromIterator<ChannelInfo> for ChannelSnapshot {
    fn from_iter<I: IntoIterator<Item = ChannelInfo>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(ids: &[u32]) -> ChannelSnapshot {
        ids.iter()
            .map(|&id| ChannelInfo {
                id,
                name: format!("ch{id}"),
                parent_id: 0,
                user_count: 0,
            })
            .collect()
    }

    #[test]
    fn up_skips_missing_ids() {
        let snap = snapshot(&[0, 1, 3, 5]);
        assert_eq!(snap.max_id(), 5);
        assert_eq!(snap.step_up(1, 1), Step::Move(3));
        assert_eq!(snap.step_up(3, 3), Step::Move(5));
    }

    #[test]
    fn up_at_max_is_boundary() {
        let snap = snapshot(&[0, 1, 3, 5]);
        assert_eq!(snap.step_up(5, 5), Step::Boundary);
    }

    #[test]
    fn up_continues_past_denied_anchor() {
        // Tried 3 and was refused, still sitting in 1.
        let snap = snapshot(&[0, 1, 3, 5]);
        assert_eq!(snap.step_up(1, 3), Step::Move(5));
        assert_eq!(snap.step_up(1, 5), Step::Boundary);
    }

    #[test]
    fn down_skips_missing_ids_and_reaches_root() {
        let snap = snapshot(&[0, 1, 3, 5]);
        assert_eq!(snap.step_down(5, 5), Step::Move(3));
        assert_eq!(snap.step_down(3, 3), Step::Move(1));
        assert_eq!(snap.step_down(1, 1), Step::Move(0));
        assert_eq!(snap.step_down(0, 0), Step::Boundary);
    }

    #[test]
    fn down_continues_past_denied_anchor() {
        let snap = snapshot(&[0, 1, 3, 5]);
        assert_eq!(snap.step_down(5, 3), Step::Move(1));
    }

    #[test]
    fn empty_snapshot_has_no_moves() {
        let snap = ChannelSnapshot::default();
        assert_eq!(snap.max_id(), 0);
        assert_eq!(snap.step_up(0, 0), Step::Boundary);
    }

    #[test]
    fn listing_marks_parents_and_children() {
        let snap = ChannelSnapshot::new(vec![
            ChannelInfo {
                id: 2,
                name: "Ops".into(),
                parent_id: 1,
                user_count: 2,
            },
            ChannelInfo {
                id: 0,
                name: "Root".into(),
                parent_id: 0,
                user_count: 1,
            },
            ChannelInfo {
                id: 1,
                name: "Site".into(),
                parent_id: 0,
                user_count: 0,
            },
        ]);

        insta::assert_snapshot!(snap.listing().join("\n"), @r"
        Parent -> ID= 0 | Name=Root         (1) Users
        Parent -> ID= 1 | Name=Site         (0) Users
        Child  -> ID= 2 | Name=Ops          (2) Users | PID= 1 | PName=Site
        ");
    }
}
