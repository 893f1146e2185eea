//! The record and routing-table data model (§3): element types, and the
//! column-major routing matrices every strategy sweeps.

/// An element type understood by the transport, mirroring the original's
/// `MPI_Datatype` enumeration as seen in
/// `RuntimeImpl_GA_Common::convert_mpi_type_to_ga_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Char,
    Int32,
    Float32,
    Float64,
}

impl ElementType {
    /// Byte size of one element, the original's `MPI_Type_extent`.
    pub fn extent(self) -> usize {
        match self {
            ElementType::Char => 1,
            ElementType::Int32 => 4,
            ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }
}

/// A column-major routing matrix pair `(worker, offsets)` of shape
/// `num_vals x max_worker_per_val` (§3 "Per-invocation routing tables").
/// `worker[v, k] == -1` marks an unused column for record `v`.
pub struct RoutingTable<'a> {
    pub num_vals: usize,
    pub max_worker_per_val: usize,
    pub worker: &'a [i32],
    pub offsets: &'a [i32],
}

impl<'a> RoutingTable<'a> {
    fn index(&self, v: usize, k: usize) -> usize {
        v + k * self.num_vals
    }

    pub fn worker_at(&self, v: usize, k: usize) -> i32 {
        self.worker[self.index(v, k)]
    }

    pub fn offset_at(&self, v: usize, k: usize) -> i32 {
        self.offsets[self.index(v, k)]
    }

    /// Sweeps the matrix in column-major order — outer loop over `k`, inner
    /// loop over `v` — and yields every valid `(v, k, worker, offset)`
    /// entry, skipping `-1` columns. The coalescing rules in C9-C11 depend
    /// on this exact sweep order (§9 "Column-major routing matrices"): runs
    /// of contiguous `v` within a fixed `k` are what gets fused.
    pub fn entries(&'a self) -> impl Iterator<Item = (usize, usize, usize, usize)> + 'a {
        (0..self.max_worker_per_val).flat_map(move |k| {
            (0..self.num_vals).filter_map(move |v| {
                let w = self.worker_at(v, k);
                if w < 0 {
                    None
                } else {
                    Some((v, k, w as usize, self.offset_at(v, k) as usize))
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweeps_column_major_and_skips_negative() {
        // num_vals=2, max_worker_per_val=2, column-major storage.
        let worker = vec![0, 1, -1, 1];
        let offsets = vec![0, 0, 0, 1];
        let table = RoutingTable {
            num_vals: 2,
            max_worker_per_val: 2,
            worker: &worker,
            offsets: &offsets,
        };
        let entries: Vec<_> = table.entries().collect();
        assert_eq!(entries, vec![(0, 0, 0, 0), (1, 0, 1, 0), (1, 1, 1, 1)]);
    }
}
