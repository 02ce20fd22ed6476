use std::collections::BTreeMap;
use std::collections::HashMap;

/// One composite ("multimask") entry: the original labels that overlap at
/// some voxel, in discovery order, plus the number of voxels currently
/// resolved to this composite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiMaskBean {
    members: Vec<u32>,
    voxel_count: usize,
}

impl MultiMaskBean {
    /// Contributing labels in discovery order. Never mutated after creation;
    /// growth always allocates a new composite.
    pub fn members(&self) -> &[u32] {
        &self.members
    }

    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }

    pub fn expansion_count(&self) -> usize {
        self.members.len()
    }
}

/// Allocates and tracks composite mask identifiers for voxels claimed by
/// more than one object's mask.
///
/// Feed every would-be overwrite of a non-zero voxel through [`get_mask`]:
/// it hands back either the candidate label unchanged (no conflict) or a
/// composite id standing for the full set of labels seen at that voxel.
/// Identical membership sets always resolve to the same id, so the table
/// stays minimal as millions of voxels are scanned.
///
/// One tracker serves exactly one consolidation pass. Calls must be
/// serialized: id allocation depends on discovery order.
///
/// [`get_mask`]: MultiMaskTracker::get_mask
pub struct MultiMaskTracker {
    // All composites ever allocated, active or retired. Ids are sequential,
    // so iteration order is creation order.
    beans: BTreeMap<u32, MultiMaskBean>,
    // Membership list -> composite id, order-sensitive, spanning retired
    // composites too so a recurring membership never re-allocates.
    members_to_mask: HashMap<Vec<u32>, u32>,
    next_mask_num: u32,
}

impl MultiMaskTracker {
    /// Creates a tracker whose first allocated composite id is
    /// `first_mask_num`. The caller picks a value past every plain label in
    /// use so composite ids never collide with label ids.
    pub fn new(first_mask_num: u32) -> Self {
        Self {
            beans: BTreeMap::new(),
            members_to_mask: HashMap::new(),
            next_mask_num: first_mask_num,
        }
    }

    /// Resolves one voxel observation: `candidate` is the label about to be
    /// written, `occupant` the value already stored there. Returns the value
    /// that should actually be stored.
    ///
    /// A zero or identical occupant is no conflict and the candidate comes
    /// back untouched. An occupant matching an active composite expands that
    /// composite's membership; anything else is treated as a plain label and
    /// the membership is the literal pair `[occupant, candidate]`, occupant
    /// first since it was written earlier. Either way the membership is
    /// looked up before a new id is allocated, so repeats are idempotent.
    ///
    /// Citing an active composite as the occupant moves one voxel off it:
    /// its voxel count drops by one, and at zero it retires from the
    /// enumerable table (it stays addressable by id). A retired composite
    /// cited again later is not expanded; its id is embedded literally as a
    /// member of the new composite.
    pub fn get_mask(&mut self, candidate: u32, occupant: u32) -> u32 {
        if occupant == 0 || occupant == candidate {
            return candidate;
        }

        let expanded = self
            .beans
            .get(&occupant)
            .filter(|bean| bean.voxel_count > 0)
            .map(|bean| bean.members.clone());
        let occupant_is_active = expanded.is_some();
        let mut members = expanded.unwrap_or_else(|| vec![occupant]);
        members.push(candidate);

        let mask_num = match self.members_to_mask.get(&members) {
            Some(&existing) => {
                if let Some(bean) = self.beans.get_mut(&existing) {
                    bean.voxel_count += 1;
                }
                existing
            }
            None => {
                let allocated = self.next_mask_num;
                self.next_mask_num += 1;
                self.beans.insert(
                    allocated,
                    MultiMaskBean {
                        members: members.clone(),
                        voxel_count: 1,
                    },
                );
                self.members_to_mask.insert(members, allocated);
                allocated
            }
        };

        if occupant_is_active {
            // The voxel that held the occupant now holds the new value.
            if let Some(bean) = self.beans.get_mut(&occupant) {
                bean.voxel_count -= 1;
            }
        }

        mask_num
    }

    /// Number of labels folded into `mask_num`, or 1 for an id that never
    /// became a composite.
    pub fn get_mask_expansion_count(&self, mask_num: u32) -> usize {
        self.beans
            .get(&mask_num)
            .map_or(1, MultiMaskBean::expansion_count)
    }

    /// By-id lookup across active and retired composites alike.
    pub fn get_multi_mask_bean(&self, mask_num: u32) -> Option<&MultiMaskBean> {
        self.beans.get(&mask_num)
    }

    /// Currently-active composites (at least one voxel still resolves to
    /// them), in creation order.
    pub fn get_multi_mask_beans(&self) -> impl Iterator<Item = (u32, &MultiMaskBean)> {
        self.beans
            .iter()
            .filter(|(_, bean)| bean.voxel_count > 0)
            .map(|(&mask_num, bean)| (mask_num, bean))
    }
}
