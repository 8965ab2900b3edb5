//! Services shared by every command of a session.

use std::sync::Arc;
use vs_matrix::{InMemoryMatrixStore, MatrixData, MatrixResult, MatrixService};

/// Default number of hourly rows in a time series.
pub const HOURS_IN_YEAR: usize = 8760;

/// Ids of the matrices commands fall back to when an argument is omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixConstants {
    pub null_matrix: String,
    pub link: String,
    pub binding_hourly: String,
    pub binding_daily: String,
    pub binding_weekly: String,
    pub thermal_prepro: String,
    pub thermal_modulation: String,
    pub storage_ones: String,
    pub storage_zeros: String,
}

fn filled(rows: usize, row: &[f64]) -> MatrixData {
    vec![row.to_vec(); rows]
}

impl MatrixConstants {
    /// Upload the constant matrices; `hourly_rows` sizes every series.
    pub fn init(service: &dyn MatrixService, hourly_rows: usize) -> MatrixResult<Self> {
        let daily_rows = hourly_rows.div_ceil(24) + 1;
        let hourly_bc_rows = hourly_rows + 24;
        Ok(Self {
            null_matrix: service.create(&Vec::new())?,
            link: service.create(&filled(
                hourly_rows,
                &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ))?,
            binding_hourly: service.create(&filled(hourly_bc_rows, &[0.0; 3]))?,
            binding_daily: service.create(&filled(daily_rows, &[0.0; 3]))?,
            binding_weekly: service.create(&filled(daily_rows, &[0.0; 3]))?,
            thermal_prepro: service.create(&filled(
                daily_rows - 1,
                &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            ))?,
            thermal_modulation: service.create(&filled(hourly_rows, &[1.0, 1.0, 1.0, 0.0]))?,
            storage_ones: service.create(&filled(hourly_rows, &[1.0]))?,
            storage_zeros: service.create(&filled(hourly_rows, &[0.0]))?,
        })
    }

    pub fn binding_series(&self, step: crate::common::TimeStep) -> &str {
        match step {
            crate::common::TimeStep::Hourly => &self.binding_hourly,
            crate::common::TimeStep::Daily => &self.binding_daily,
            crate::common::TimeStep::Weekly => &self.binding_weekly,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        vec![
            &self.null_matrix,
            &self.link,
            &self.binding_hourly,
            &self.binding_daily,
            &self.binding_weekly,
            &self.thermal_prepro,
            &self.thermal_modulation,
            &self.storage_ones,
            &self.storage_zeros,
        ]
    }
}

/// Injected into `apply`/`revert`; commands never own it.
#[derive(Clone)]
pub struct CommandContext {
    pub matrix_service: Arc<dyn MatrixService>,
    pub constants: MatrixConstants,
}

impl CommandContext {
    pub fn new(matrix_service: Arc<dyn MatrixService>, hourly_rows: usize) -> MatrixResult<Self> {
        let constants = MatrixConstants::init(matrix_service.as_ref(), hourly_rows)?;
        Ok(Self {
            matrix_service,
            constants,
        })
    }

    /// A context over a fresh in-memory store.
    pub fn in_memory(hourly_rows: usize) -> MatrixResult<(Self, InMemoryMatrixStore)> {
        let store = InMemoryMatrixStore::new();
        let ctx = Self::new(Arc::new(store.clone()), hourly_rows)?;
        Ok((ctx, store))
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("constants", &self.constants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_stored_and_distinct_where_shapes_differ() {
        let (ctx, store) = CommandContext::in_memory(48).unwrap();
        for id in ctx.constants.ids() {
            assert!(store.exists(id).unwrap());
        }
        assert_ne!(ctx.constants.binding_hourly, ctx.constants.binding_daily);
        // Daily and weekly series share a shape, so they share an id.
        assert_eq!(ctx.constants.binding_daily, ctx.constants.binding_weekly);
    }
}
