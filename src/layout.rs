use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IflowError, IflowErrorLocation, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Event,
    Activity,
    Gateway,
    Participant,
}

/// Vertical band a node is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Main,
    /// Branch `n` of a gateway; branch 0 shares the main lane.
    Branch(usize),
    /// Exception subprocess `n`, below everything placed before it.
    ErrorHandling(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub start_x: i64,
    pub start_y: i64,
    pub component_spacing_x: i64,
    pub lane_height: i64,
    pub participant_y_offset: i64,
    pub event_size: Size,
    pub activity_size: Size,
    pub gateway_size: Size,
    pub participant_size: Size,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            start_x: 300,
            start_y: 140,
            component_spacing_x: 150,
            lane_height: 200,
            participant_y_offset: 341,
            event_size: Size {
                width: 32,
                height: 32,
            },
            activity_size: Size {
                width: 100,
                height: 60,
            },
            gateway_size: Size {
                width: 40,
                height: 40,
            },
            participant_size: Size {
                width: 100,
                height: 140,
            },
        }
    }
}

impl LayoutSettings {
    pub fn size_of(&self, category: NodeCategory) -> Size {
        match category {
            NodeCategory::Event => self.event_size,
            NodeCategory::Activity => self.activity_size,
            NodeCategory::Gateway => self.gateway_size,
            NodeCategory::Participant => self.participant_size,
        }
    }

    /// Distance between a lane's top and the receiver participants hanging off it.
    fn participant_drop(&self) -> i64 {
        self.participant_y_offset - self.start_y
    }

    /// Vertical gap kept between stacked bands.
    fn band_gap(&self) -> i64 {
        self.lane_height / 2
    }

    /// Height of one lane including the receiver participants below its nodes.
    pub fn lane_pitch(&self) -> i64 {
        (self.participant_drop() + self.participant_size.height + self.band_gap())
            .max(self.lane_height)
    }

    fn branch_y(&self, n: usize) -> i64 {
        self.start_y + n as i64 * self.lane_pitch()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Position {
    fn right(&self) -> i64 {
        self.x + self.width
    }

    fn bottom(&self) -> i64 {
        self.y + self.height
    }

    fn mid_x(&self) -> i64 {
        self.x + self.width / 2
    }

    fn mid_y(&self) -> i64 {
        self.y + self.height / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Waypoints {
    pub source_x: i64,
    pub source_y: i64,
    pub target_x: i64,
    pub target_y: i64,
}

/// Deterministic left-to-right layout for one flow.
///
/// The horizontal cursor only moves forward, so call order must follow execution order. Create
/// one instance per assembly.
#[derive(Debug, Clone)]
pub struct PositionManager {
    settings: LayoutSettings,
    positions: IndexMap<String, Position>,
    lane_tops: HashMap<String, i64>,
    error_lanes: HashMap<usize, i64>,
    current_x: i64,
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionManager {
    pub fn new() -> Self {
        Self::with_settings(LayoutSettings::default())
    }

    pub fn with_settings(settings: LayoutSettings) -> Self {
        PositionManager {
            current_x: settings.start_x,
            settings,
            positions: IndexMap::new(),
            lane_tops: HashMap::new(),
            error_lanes: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    /// x the next placed node will get.
    pub fn cursor(&self) -> i64 {
        self.current_x
    }

    /// Move the cursor, e.g. back to a gateway so sibling branches share an x range.
    pub fn set_cursor(&mut self, x: i64) {
        self.current_x = x;
    }

    pub fn calculate_position(&mut self, node_id: &str, category: NodeCategory) -> Position {
        self.calculate_position_in_lane(node_id, category, Lane::Main)
    }

    pub fn calculate_position_in_lane(
        &mut self,
        node_id: &str,
        category: NodeCategory,
        lane: Lane,
    ) -> Position {
        if let Some(existing) = self.positions.get(node_id) {
            return *existing;
        }
        let size = self.settings.size_of(category);
        let lane_top = self.lane_top(lane);
        let mut y = lane_top;
        if matches!(category, NodeCategory::Event | NodeCategory::Gateway) {
            y += (self.settings.activity_size.height - size.height) / 2;
        }
        let position = Position {
            x: self.current_x,
            y,
            width: size.width,
            height: size.height,
        };
        self.positions.insert(node_id.to_string(), position);
        self.lane_tops.insert(node_id.to_string(), lane_top);
        self.current_x += self.settings.component_spacing_x;
        position
    }

    /// Top of a lane. An error lane is fixed the first time it is used, below every shape placed
    /// so far, so it never shares a band with branches or their participants.
    fn lane_top(&mut self, lane: Lane) -> i64 {
        match lane {
            Lane::Main => self.settings.start_y,
            Lane::Branch(n) => self.settings.branch_y(n),
            Lane::ErrorHandling(n) => {
                if let Some(top) = self.error_lanes.get(&n) {
                    return *top;
                }
                let floor = self.settings.participant_y_offset
                    + self.settings.participant_size.height
                    + self.settings.band_gap();
                let top = self
                    .positions
                    .values()
                    .map(|p| p.bottom() + self.settings.band_gap())
                    .fold(floor, i64::max);
                self.error_lanes.insert(n, top);
                top
            }
        }
    }

    /// Receiver participant below its calling task. Does not move the cursor.
    pub fn calculate_participant_position(
        &mut self,
        participant_id: &str,
        anchor_id: &str,
    ) -> Result<Position> {
        let anchor = self.position(anchor_id)?;
        let lane_top = self
            .lane_tops
            .get(anchor_id)
            .copied()
            .unwrap_or(self.settings.start_y);
        let size = self.settings.participant_size;
        let position = Position {
            x: anchor.x,
            y: lane_top + self.settings.participant_drop(),
            width: size.width,
            height: size.height,
        };
        self.positions.insert(participant_id.to_string(), position);
        Ok(position)
    }

    /// Sender participant to the left of the start event.
    pub fn calculate_sender_position(
        &mut self,
        participant_id: &str,
        start_id: &str,
    ) -> Result<Position> {
        let start = self.position(start_id)?;
        let size = self.settings.participant_size;
        let position = Position {
            x: (start.x - 234).max(0),
            y: (start.mid_y() - size.height / 2).max(0),
            width: size.width,
            height: size.height,
        };
        self.positions.insert(participant_id.to_string(), position);
        Ok(position)
    }

    /// Box around already placed children, used for exception subprocesses.
    pub fn container_bounds(&mut self, container_id: &str, children: &[&str]) -> Result<Position> {
        let mut placed = Vec::with_capacity(children.len());
        for child in children {
            placed.push(self.position(child)?);
        }
        let bounds = enclose(&placed, 30).ok_or_else(|| IflowError::Internal {
            message: format!("container '{container_id}' has no placed children"),
            location: IflowErrorLocation::at_path(format!("layout.{container_id}")),
        })?;
        self.positions.insert(container_id.to_string(), bounds);
        Ok(bounds)
    }

    /// Pool of the integration process: everything placed so far except participants.
    pub fn process_bounds(&mut self, participant_id: &str, participants: &[&str]) -> Position {
        let placed: Vec<Position> = self
            .positions
            .iter()
            .filter(|(id, _)| !participants.contains(&id.as_str()))
            .map(|(_, pos)| *pos)
            .collect();
        let bounds = enclose(&placed, 60).unwrap_or(Position {
            x: self.settings.start_x - 60,
            y: self.settings.start_y - 60,
            width: self.settings.component_spacing_x * 2,
            height: self.settings.lane_height,
        });
        let bounds = Position {
            height: bounds.height + 40,
            ..bounds
        };
        self.positions.insert(participant_id.to_string(), bounds);
        bounds
    }

    pub fn position(&self, node_id: &str) -> Result<Position> {
        self.positions
            .get(node_id)
            .copied()
            .ok_or_else(|| IflowError::Internal {
                message: format!("node '{node_id}' was never placed"),
                location: IflowErrorLocation::at_path(format!("layout.{node_id}")),
            })
    }

    pub fn positions(&self) -> &IndexMap<String, Position> {
        &self.positions
    }

    /// Right edge of the source to the left edge of the target, both at mid height.
    pub fn calculate_sequence_flow_waypoints(&self, from_id: &str, to_id: &str) -> Result<Waypoints> {
        let source = self.position(from_id)?;
        let target = self.position(to_id)?;
        Ok(Waypoints {
            source_x: source.right(),
            source_y: source.mid_y(),
            target_x: target.x,
            target_y: target.mid_y(),
        })
    }

    /// Vertical drop from the bottom of a task to the top of its participant.
    pub fn calculate_message_flow_waypoints(&self, from_id: &str, to_id: &str) -> Result<Waypoints> {
        let source = self.position(from_id)?;
        let target = self.position(to_id)?;
        if target.y >= source.bottom() {
            Ok(Waypoints {
                source_x: source.mid_x(),
                source_y: source.bottom(),
                target_x: target.mid_x(),
                target_y: target.y,
            })
        } else {
            self.calculate_sequence_flow_waypoints(from_id, to_id)
        }
    }
}

fn enclose(positions: &[Position], padding: i64) -> Option<Position> {
    let min_x = positions.iter().map(|p| p.x).min()?;
    let min_y = positions.iter().map(|p| p.y).min()?;
    let max_x = positions.iter().map(Position::right).max()?;
    let max_y = positions.iter().map(Position::bottom).max()?;
    Some(Position {
        x: min_x - padding,
        y: min_y - padding,
        width: max_x - min_x + 2 * padding,
        height: max_y - min_y + 2 * padding,
    })
}
