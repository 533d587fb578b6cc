//! Router configuration (spec §6, SPEC_FULL.md §A). A plain struct with
//! `Default`; the client constructs one and mutates it through the
//! router's `setRoutingOption`/`setRoutingPenalty` API, which queues the
//! change like any other action (spec §5).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    Segment,
    Angle,
    Crossing,
    ClusterCrossing,
    FixedSharedPath,
    PortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingOption {
    NudgeOrthogonalSegmentsConnectedToShapes,
    ImproveHyperedgeRouting,
    PenaliseOrthogonalSharedPaths,
    FixedSharedPathPenalty,
    PerformUnifyingNudgingPreprocessingStep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingParameters {
    pub segment_penalty: f64,
    pub angle_penalty: f64,
    pub crossing_penalty: f64,
    pub cluster_crossing_penalty: f64,
    pub fixed_shared_path_penalty: f64,
    pub port_direction_penalty: f64,

    pub nudge_orthogonal_segments_connected_to_shapes: bool,
    pub improve_hyperedge_routing: bool,
    pub penalise_orthogonal_shared_paths: bool,
    pub fixed_shared_path_penalty_enabled: bool,
    pub perform_unifying_nudging_preprocessing_step: bool,

    pub orthogonal_nudge_distance: f64,
}

impl Default for RoutingParameters {
    fn default() -> Self {
        Self {
            segment_penalty: 50.0,
            angle_penalty: 0.0,
            crossing_penalty: 400.0,
            cluster_crossing_penalty: 4000.0,
            fixed_shared_path_penalty: 200.0,
            port_direction_penalty: 100.0,

            nudge_orthogonal_segments_connected_to_shapes: true,
            improve_hyperedge_routing: true,
            penalise_orthogonal_shared_paths: false,
            fixed_shared_path_penalty_enabled: false,
            perform_unifying_nudging_preprocessing_step: true,

            orthogonal_nudge_distance: 4.0,
        }
    }
}

impl RoutingParameters {
    pub fn set_penalty(&mut self, kind: PenaltyKind, value: f64) {
        match kind {
            PenaltyKind::Segment => self.segment_penalty = value,
            PenaltyKind::Angle => self.angle_penalty = value,
            PenaltyKind::Crossing => self.crossing_penalty = value,
            PenaltyKind::ClusterCrossing => self.cluster_crossing_penalty = value,
            PenaltyKind::FixedSharedPath => self.fixed_shared_path_penalty = value,
            PenaltyKind::PortDirection => self.port_direction_penalty = value,
        }
    }

    pub fn set_option(&mut self, opt: RoutingOption, enabled: bool) {
        match opt {
            RoutingOption::NudgeOrthogonalSegmentsConnectedToShapes => {
                self.nudge_orthogonal_segments_connected_to_shapes = enabled
            }
            RoutingOption::ImproveHyperedgeRouting => self.improve_hyperedge_routing = enabled,
            RoutingOption::PenaliseOrthogonalSharedPaths => self.penalise_orthogonal_shared_paths = enabled,
            RoutingOption::FixedSharedPathPenalty => self.fixed_shared_path_penalty_enabled = enabled,
            RoutingOption::PerformUnifyingNudgingPreprocessingStep => {
                self.perform_unifying_nudging_preprocessing_step = enabled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_penalty_updates_the_right_field() {
        let mut p = RoutingParameters::default();
        p.set_penalty(PenaltyKind::Crossing, 12.5);
        assert_eq!(p.crossing_penalty, 12.5);
    }

    #[test]
    fn set_option_toggles_the_right_flag() {
        let mut p = RoutingParameters::default();
        p.set_option(RoutingOption::PenaliseOrthogonalSharedPaths, true);
        assert!(p.penalise_orthogonal_shared_paths);
    }
}
