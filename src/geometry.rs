//! Crop planning, including the charts that cannot be cut with one polygon.
//!
//! Almost every chart is cropped against a cutline with its own name
//! (`Seattle.tif` → `Seattle.shp`). Two exceptions are recognised by name:
//!
//! - **Wall planning chart**: the published file name varies between
//!   editions, so it always uses the fixed cutline
//!   `U_S_VFR_Wall_Planning_Chart.shp`.
//! - **Western Aleutian Islands**: the sheet straddles the ±180° meridian.
//!   Warping it as one raster would smear it across the whole map, so it is
//!   cut twice into `Western_Aleutian_Islands_East` and `_West`. From the
//!   crop stage on, the halves are two ordinary, unrelated charts.
//!
//! Each output of a plan is its own work item with its own skip test, so a
//! half left missing by an interrupted run is produced on the next run
//! without touching the half that already exists.

use crate::types::ChartId;

const WALL_PLANNING_MARKER: &str = "U.S._VFR_Wall_Planning_Chart";
const WALL_PLANNING_CUTLINE: &str = "U_S_VFR_Wall_Planning_Chart";
const ANTIMERIDIAN_CHART: &str = "Western_Aleutian_Islands";

/// Extension of cutline shapefiles.
pub const CUTLINE_EXTENSION: &str = "shp";

/// One crop operation: which artifact to produce and which polygon to cut with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropJob {
    /// Identifier of the cropped artifact (and of everything downstream of it).
    pub output: ChartId,
    /// Cutline file name, relative to the category's clipping-shape directory.
    pub cutline: String,
}

/// The crop operations needed for one color-expanded chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropPlan {
    pub jobs: Vec<CropJob>,
}

impl CropPlan {
    pub fn for_chart(id: &ChartId) -> Self {
        let name = id.as_str();
        let jobs = if name.contains(WALL_PLANNING_MARKER) {
            vec![CropJob {
                output: id.clone(),
                cutline: cutline_file(WALL_PLANNING_CUTLINE),
            }]
        } else if name.contains(ANTIMERIDIAN_CHART) {
            let base = ChartId::new(ANTIMERIDIAN_CHART);
            ["East", "West"]
                .into_iter()
                .map(|half| {
                    let output = base.with_suffix(half);
                    let cutline = cutline_file(output.as_str());
                    CropJob { output, cutline }
                })
                .collect()
        } else {
            vec![CropJob {
                output: id.clone(),
                cutline: cutline_file(name),
            }]
        };
        Self { jobs }
    }

    pub fn is_split(&self) -> bool {
        self.jobs.len() > 1
    }
}

/// Identifiers a chart produces from the crop stage onwards.
pub fn derived_ids(id: &ChartId) -> Vec<ChartId> {
    CropPlan::for_chart(id)
        .jobs
        .into_iter()
        .map(|job| job.output)
        .collect()
}

fn cutline_file(stem: &str) -> String {
    format!("{stem}.{CUTLINE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_chart_uses_own_cutline() {
        let plan = CropPlan::for_chart(&ChartId::new("Seattle"));
        assert_eq!(
            plan.jobs,
            vec![CropJob {
                output: ChartId::new("Seattle"),
                cutline: "Seattle.shp".into()
            }]
        );
        assert!(!plan.is_split());
    }

    #[test]
    fn wall_planning_chart_uses_fixed_cutline() {
        let id = ChartId::new("U.S._VFR_Wall_Planning_Chart");
        let plan = CropPlan::for_chart(&id);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].output, id);
        assert_eq!(plan.jobs[0].cutline, "U_S_VFR_Wall_Planning_Chart.shp");
    }

    #[test]
    fn antimeridian_chart_splits_into_two() {
        let plan = CropPlan::for_chart(&ChartId::new("Western_Aleutian_Islands"));
        assert!(plan.is_split());
        let outputs: Vec<&str> = plan.jobs.iter().map(|j| j.output.as_str()).collect();
        assert_eq!(
            outputs,
            vec!["Western_Aleutian_Islands_East", "Western_Aleutian_Islands_West"]
        );
        let cutlines: Vec<&str> = plan.jobs.iter().map(|j| j.cutline.as_str()).collect();
        assert_eq!(
            cutlines,
            vec![
                "Western_Aleutian_Islands_East.shp",
                "Western_Aleutian_Islands_West.shp"
            ]
        );
    }

    #[test]
    fn derived_ids_of_ordinary_chart_is_itself() {
        assert_eq!(
            derived_ids(&ChartId::new("Anchorage")),
            vec![ChartId::new("Anchorage")]
        );
    }

    #[test]
    fn derived_ids_of_split_chart_are_halves() {
        let ids = derived_ids(&ChartId::new("Western_Aleutian_Islands"));
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.as_str().starts_with("Western_Aleutian_Islands_")));
    }
}
