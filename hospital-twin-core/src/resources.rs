//! Resource pools: beds, nurses, and counted resources (imaging, transport).

use crate::types::{Bed, BedId, BedType, Nurse, NurseId, PatientId, VirtualMinutes};
use std::collections::VecDeque;

/// Ordered bed pool, ids `1..=n`. Isolation beds sit at positions 1 and n.
pub struct BedPool {
    beds: Vec<Bed>,
    /// FIFO of patients waiting for a bed.
    pub wait_queue: VecDeque<PatientId>,
}

impl BedPool {
    pub fn new(count: u32) -> Self {
        let n = count.max(1);
        let beds = (1..=n)
            .map(|id| {
                let bed_type = if id == 1 || id == n {
                    BedType::Isolation
                } else {
                    BedType::Standard
                };
                Bed::new(id, bed_type)
            })
            .collect();
        Self {
            beds,
            wait_queue: VecDeque::new(),
        }
    }

    pub fn get(&self, id: BedId) -> Option<&Bed> {
        self.beds.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: BedId) -> Option<&mut Bed> {
        self.beds.iter_mut().find(|b| b.id == id)
    }

    /// Select and reserve a bed for an arriving patient, honoring the
    /// isolation preference. Returns `None` if no bed qualifies — caller is
    /// responsible for enqueuing into `wait_queue`.
    pub fn acquire(&mut self, now: VirtualMinutes, prefer_isolation: bool) -> Option<BedId> {
        let pick = |beds: &[Bed], want_isolation: Option<BedType>| {
            beds.iter()
                .filter(|b| match want_isolation {
                    Some(t) => b.bed_type == t,
                    None => true,
                })
                .find(|b| b.is_idle() && b.available_at <= now)
                .map(|b| b.id)
        };

        let chosen = if prefer_isolation {
            pick(&self.beds, Some(BedType::Isolation)).or_else(|| pick(&self.beds, None))
        } else {
            pick(&self.beds, None)
        };

        if let Some(id) = chosen {
            let bed = self.get_mut(id).expect("id came from self.beds");
            bed.is_occupied = true;
        }
        chosen
    }

    pub fn assign_patient(&mut self, bed_id: BedId, patient_id: PatientId) {
        if let Some(bed) = self.get_mut(bed_id) {
            bed.patient_id = Some(patient_id);
        }
    }

    /// Mark a specific (already-idle) bed occupied. Used when the bed-wait
    /// FIFO head is granted a bed that just finished cleaning, where the
    /// caller already knows which bed it is and `acquire`'s scan is
    /// redundant.
    pub fn occupy(&mut self, bed_id: BedId) {
        if let Some(bed) = self.get_mut(bed_id) {
            bed.is_occupied = true;
        }
    }

    /// Discharge: free the bed from occupancy and place it into cleaning.
    pub fn begin_cleaning(&mut self, bed_id: BedId) {
        if let Some(bed) = self.get_mut(bed_id) {
            bed.is_occupied = false;
            bed.is_cleaning = true;
            bed.patient_id = None;
        }
    }

    pub fn end_cleaning(&mut self, bed_id: BedId, now: VirtualMinutes) {
        if let Some(bed) = self.get_mut(bed_id) {
            bed.is_cleaning = false;
            bed.available_at = now;
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.beds.iter().filter(|b| b.is_occupied).count()
    }

    pub fn len(&self) -> usize {
        self.beds.len()
    }

    pub fn all(&self) -> &[Bed] {
        &self.beds
    }
}

/// Nurse pool. Selection picks the least-loaded nurse under `max_patients`,
/// ties broken by id.
pub struct NursePool {
    nurses: Vec<Nurse>,
}

impl NursePool {
    pub fn new(count: u32) -> Self {
        Self {
            nurses: (1..=count.max(0)).map(Nurse::new).collect(),
        }
    }

    /// Assign `patient_id` to the least-loaded nurse with capacity. Returns
    /// `None` (and logs nothing itself — the caller records the
    /// `nurse_staffing` bottleneck) if every nurse is full.
    pub fn assign(&mut self, patient_id: PatientId) -> Option<NurseId> {
        let nurse = self
            .nurses
            .iter_mut()
            .filter(|n| !n.is_full())
            .min_by_key(|n| (n.assigned_patients.len(), n.id))?;
        nurse.assigned_patients.push(patient_id);
        Some(nurse.id)
    }

    pub fn release(&mut self, nurse_id: NurseId, patient_id: PatientId) {
        if let Some(nurse) = self.nurses.iter_mut().find(|n| n.id == nurse_id) {
            nurse.assigned_patients.retain(|&p| p != patient_id);
        }
    }

    pub fn all_full(&self) -> bool {
        !self.nurses.is_empty() && self.nurses.iter().all(Nurse::is_full)
    }

    pub fn mean_load(&self) -> f64 {
        if self.nurses.is_empty() {
            return 0.0;
        }
        let total: usize = self.nurses.iter().map(|n| n.assigned_patients.len()).sum();
        total as f64 / self.nurses.len() as f64
    }

    pub fn len(&self) -> usize {
        self.nurses.len()
    }
}

/// A counted resource (imaging or transport slots) with a FIFO wait list.
/// `acquire`/`release` mirror the teacher's job-queue/inflight-job split in
/// `store_memory::Inner`.
pub struct ResourceCounter {
    pub capacity: u32,
    pub in_use: u32,
    pub wait_queue: VecDeque<PatientId>,
}

impl ResourceCounter {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            in_use: 0,
            wait_queue: VecDeque::new(),
        }
    }

    /// Returns `true` if a slot was acquired; otherwise the caller should
    /// enqueue into `wait_queue`.
    pub fn try_acquire(&mut self) -> bool {
        if self.in_use < self.capacity {
            self.in_use += 1;
            true
        } else {
            false
        }
    }

    /// Release a slot. Returns the next waiter (if any) who should now
    /// acquire on their behalf.
    pub fn release(&mut self) -> Option<PatientId> {
        self.in_use = self.in_use.saturating_sub(1);
        if let Some(next) = self.wait_queue.pop_front() {
            self.in_use += 1;
            Some(next)
        } else {
            None
        }
    }

    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }
}
