//! Display models for the war room dashboard.
//!
//! Everything here is derived from immutable [`DashboardData`] plus the
//! latest [`SnapshotState`]; nothing is cached between builds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use warroom_types::{
    dashboard::{
        ContentMix, DashboardData, MatrixPoint, PlanPhase, RiskAxis, ShareSlice, TrendPoint,
        TrendRange, AVG_CONCURRENT_KEY,
    },
    kpi::{KpiMetric, Normalizer},
    snapshot::{FollowerCount, SnapshotState},
    status::{classify, StatusTier},
};

pub const LIVE_VIEWERS_LABEL: &str = "current concurrent viewers (LIVE)";
pub const AVERAGE_VIEWERS_LABEL: &str = "average concurrent viewers";
pub const OFFLINE_ADVISORY: &str = "channel offline";
pub const LIVE_PILL: &str = "LIVE";

/// Compact count: `1.2K`, `3.4M`, plain below a thousand, `—` when not a number.
pub fn format_count(n: f64) -> String {
    if n.is_nan() {
        return "—".into();
    }
    let abs = n.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn format_percent(ratio: f64) -> String {
    if ratio.is_nan() {
        return "—".into();
    }
    format!("{}%", (ratio * 100.0).round() as i64)
}

/// The viewer metric, reconciled from the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerTile {
    pub label: &'static str,
    pub value: String,
    pub raw: f64,
    pub sub: &'static str,
    pub advisory: Option<&'static str>,
    /// Live data, rendered distinctly from the historical estimate.
    pub highlight: bool,
}

impl ViewerTile {
    pub fn from_state(state: &SnapshotState, historical_acv: f64) -> Self {
        match state {
            SnapshotState::Live(snapshot) => {
                let raw = snapshot.current_viewers as f64;
                Self {
                    label: LIVE_VIEWERS_LABEL,
                    value: format_count(raw),
                    raw,
                    sub: "LIVE",
                    advisory: None,
                    highlight: true,
                }
            }
            SnapshotState::Offline(_) => Self {
                advisory: Some(OFFLINE_ADVISORY),
                ..Self::historical(historical_acv)
            },
            SnapshotState::NoData => Self::historical(historical_acv),
        }
    }

    fn historical(acv: f64) -> Self {
        Self {
            label: AVERAGE_VIEWERS_LABEL,
            value: format_count(acv),
            raw: acv,
            sub: "ACV",
            advisory: None,
            highlight: false,
        }
    }

    pub fn tier(&self, normalizer: Normalizer) -> StatusTier {
        classify(normalizer.apply(self.raw))
    }
}

/// A static KPI stat tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiTile {
    pub key: String,
    pub label: String,
    pub value: String,
    pub unit: String,
    pub warning: Option<String>,
    pub tier: StatusTier,
}

impl KpiTile {
    pub fn from_metric(metric: &KpiMetric) -> Self {
        let value = match metric.normalizer {
            Normalizer::Ratio => format_percent(metric.raw_value),
            Normalizer::Percent => format_percent(metric.raw_value / 100.0),
            Normalizer::Linear { .. } => format_count(metric.raw_value),
        };
        Self {
            key: metric.key.clone(),
            label: metric.label.clone(),
            value,
            unit: metric.unit.clone(),
            warning: metric.warning.clone(),
            tier: metric.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tile {
    Kpi(KpiTile),
    Viewers { tile: ViewerTile, tier: StatusTier },
}

impl Tile {
    pub fn label(&self) -> &str {
        match self {
            Tile::Kpi(kpi) => &kpi.label,
            Tile::Viewers { tile, .. } => tile.label,
        }
    }

    pub fn tier(&self) -> StatusTier {
        match self {
            Tile::Kpi(kpi) => kpi.tier,
            Tile::Viewers { tier, .. } => *tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderView {
    pub title: String,
    pub platform: String,
    pub stage: String,
    pub positioning: String,
    pub live_pill: Option<&'static str>,
    /// Stream title while live, otherwise the channel one-liner.
    pub subtitle: String,
    pub followers: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl HeaderView {
    pub fn build(data: &DashboardData, state: &SnapshotState) -> Self {
        let channel = &data.channel;
        let snapshot = state.snapshot();
        let subtitle = match state {
            SnapshotState::Live(snapshot) => snapshot.stream_title.clone(),
            _ => channel.one_liner.clone(),
        };
        Self {
            title: format!("War Room | {}", channel.name),
            platform: channel.platform.clone(),
            stage: channel.stage.clone(),
            positioning: format!("Positioning: {}", channel.positioning),
            live_pill: state.is_live().then_some(LIVE_PILL),
            subtitle,
            followers: snapshot
                .filter(|s| s.followers == FollowerCount::Reported)
                .map(|s| format_count(s.total_followers as f64)),
            last_updated: snapshot.map(|s| s.fetched_at),
        }
    }
}

/// Dashboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardMode {
    #[default]
    Overview,
    Traffic,
    Content,
    Risks,
    Plan,
}

impl DashboardMode {
    pub const ALL: [DashboardMode; 5] = [
        DashboardMode::Overview,
        DashboardMode::Traffic,
        DashboardMode::Content,
        DashboardMode::Risks,
        DashboardMode::Plan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DashboardMode::Overview => "Overview",
            DashboardMode::Traffic => "Traffic",
            DashboardMode::Content => "Content",
            DashboardMode::Risks => "Risks",
            DashboardMode::Plan => "Plan",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Integer share of each slice in percent, as the pie labels show it.
pub fn share_percentages(slices: &[ShareSlice]) -> Vec<(String, u32)> {
    let total: u32 = slices.iter().map(|s| s.value).sum();
    slices
        .iter()
        .map(|s| {
            let pct = if total == 0 {
                0
            } else {
                (f64::from(s.value) * 100.0 / f64::from(total)).round() as u32
            };
            (s.name.clone(), pct)
        })
        .collect()
}

/// Everything one frame of the dashboard needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub header: HeaderView,
    pub tiles: Vec<Tile>,
    pub range: TrendRange,
    pub trend: Vec<TrendPoint>,
    pub traffic: Vec<ShareSlice>,
    pub content_mix: Vec<ContentMix>,
    pub content_matrix: Vec<MatrixPoint>,
    pub risks: Vec<RiskAxis>,
    pub risk_score: u32,
    pub monetization: Vec<ShareSlice>,
    pub phases: Vec<PlanPhase>,
    pub standing_warning: Option<String>,
}

impl DashboardView {
    pub fn build(
        data: &DashboardData,
        state: &SnapshotState,
        range: TrendRange,
        standing_warning: Option<String>,
    ) -> Self {
        let tiles = data
            .kpis
            .iter()
            .map(|metric| {
                if metric.key == AVG_CONCURRENT_KEY {
                    let tile = ViewerTile::from_state(state, data.historical_acv());
                    let tier = tile.tier(metric.normalizer);
                    Tile::Viewers { tile, tier }
                } else {
                    Tile::Kpi(KpiTile::from_metric(metric))
                }
            })
            .collect();

        Self {
            header: HeaderView::build(data, state),
            tiles,
            range,
            trend: data.trend_window(range).to_vec(),
            traffic: data.traffic.clone(),
            content_mix: data.content_mix.clone(),
            content_matrix: data.content_matrix.clone(),
            risks: data.risks.clone(),
            risk_score: data.risk_score(),
            monetization: data.monetization.clone(),
            phases: data.phases.clone(),
            standing_warning,
        }
    }

    pub fn viewer_tile(&self) -> Option<&ViewerTile> {
        self.tiles.iter().find_map(|tile| match tile {
            Tile::Viewers { tile, .. } => Some(tile),
            Tile::Kpi(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warroom_types::snapshot::ChannelSnapshot;

    fn live(viewers: u64) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: "nayabnb".into(),
            channel_id: "42".into(),
            is_live: true,
            current_viewers: viewers,
            stream_title: "Ranked grind".into(),
            total_followers: 12_345,
            followers: FollowerCount::Reported,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn format_count_matches_dashboard_conventions() {
        assert_eq!(format_count(315.0), "315");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1_000.0), "1.0K");
        assert_eq!(format_count(12_345.0), "12.3K");
        assert_eq!(format_count(2_500_000.0), "2.5M");
        assert_eq!(format_count(-1_500.0), "-1.5K");
        assert_eq!(format_count(f64::NAN), "—");
    }

    #[test]
    fn viewer_tile_without_data_shows_history() {
        let tile = ViewerTile::from_state(&SnapshotState::NoData, 315.0);
        assert_eq!(tile.label, AVERAGE_VIEWERS_LABEL);
        assert_eq!(tile.value, "315");
        assert_eq!(tile.sub, "ACV");
        assert_eq!(tile.advisory, None);
        assert!(!tile.highlight);
    }

    #[test]
    fn offline_transition_switches_label_and_raises_advisory() {
        let data = DashboardData::nayabnb();
        let before = SnapshotState::from_latest(Some(&live(120)));
        let view = DashboardView::build(&data, &before, TrendRange::Month, None);
        let tile = view.viewer_tile().expect("viewer tile");
        assert_eq!(tile.label, LIVE_VIEWERS_LABEL);
        assert_eq!(tile.value, "120");
        assert!(tile.highlight);
        assert_eq!(view.header.live_pill, Some(LIVE_PILL));
        assert_eq!(view.header.subtitle, "Ranked grind");

        let after = SnapshotState::from_latest(Some(&ChannelSnapshot::offline("nayabnb", "42")));
        let view = DashboardView::build(&data, &after, TrendRange::Month, None);
        let tile = view.viewer_tile().expect("viewer tile");
        assert_eq!(tile.label, AVERAGE_VIEWERS_LABEL);
        assert_eq!(tile.value, "315");
        assert_eq!(tile.advisory, Some(OFFLINE_ADVISORY));
        assert!(!tile.highlight);
        assert_eq!(view.header.live_pill, None);
        assert_eq!(view.header.subtitle, data.channel.one_liner);
    }

    #[test]
    fn kpi_tiles_render_ratios_as_percentages() {
        let data = DashboardData::nayabnb();
        let view = DashboardView::build(&data, &SnapshotState::NoData, TrendRange::Week, None);
        assert_eq!(view.tiles.len(), 5);

        let Tile::Kpi(growth) = &view.tiles[0] else {
            panic!("first tile is a KPI");
        };
        assert_eq!(growth.value, "18%");
        assert_eq!(growth.unit, "MoM");
        assert_eq!(growth.tier, StatusTier::Risk);

        let Tile::Kpi(chat) = &view.tiles[3] else {
            panic!("fourth tile is a KPI");
        };
        assert_eq!(chat.value, "62%");
        assert_eq!(chat.tier, StatusTier::Warning);

        let Tile::Kpi(money) = &view.tiles[4] else {
            panic!("fifth tile is a KPI");
        };
        assert_eq!(money.warning.as_deref(), Some("over-reliant on a single revenue source"));
    }

    #[test]
    fn live_viewer_tier_uses_the_acv_normalizer() {
        let data = DashboardData::nayabnb();
        let state = SnapshotState::from_latest(Some(&live(450)));
        let view = DashboardView::build(&data, &state, TrendRange::Month, None);
        let viewers = view
            .tiles
            .iter()
            .find(|t| matches!(t, Tile::Viewers { .. }))
            .expect("viewer tile");
        assert_eq!(viewers.tier(), StatusTier::Healthy);
        assert_eq!(viewers.label(), LIVE_VIEWERS_LABEL);

        let history = DashboardView::build(&data, &SnapshotState::NoData, TrendRange::Month, None);
        let viewers = history.tiles.iter().find(|t| matches!(t, Tile::Viewers { .. }));
        assert_eq!(viewers.map(Tile::tier), Some(StatusTier::Warning));
    }

    #[test]
    fn header_hides_degraded_follower_count() {
        let data = DashboardData::nayabnb();
        let mut snapshot = live(10);
        assert_eq!(
            HeaderView::build(&data, &SnapshotState::from_latest(Some(&snapshot))).followers,
            Some("12.3K".to_string())
        );
        snapshot.followers = FollowerCount::Unavailable;
        snapshot.total_followers = 0;
        let header = HeaderView::build(&data, &SnapshotState::from_latest(Some(&snapshot)));
        assert_eq!(header.followers, None);
        assert!(header.last_updated.is_some());
    }

    #[test]
    fn range_selects_trend_tail_and_carries_warning() {
        let data = DashboardData::nayabnb();
        let view = DashboardView::build(
            &data,
            &SnapshotState::NoData,
            TrendRange::Week,
            Some("channel not found for 3 consecutive polls".into()),
        );
        assert_eq!(view.trend.len(), 7);
        assert_eq!(view.trend.last().map(|p| p.day), Some(90));
        assert_eq!(view.risk_score, 66);
        assert!(view.standing_warning.is_some());
    }

    #[test]
    fn modes_cycle_in_both_directions() {
        assert_eq!(DashboardMode::default().next(), DashboardMode::Traffic);
        assert_eq!(DashboardMode::Plan.next(), DashboardMode::Overview);
        assert_eq!(DashboardMode::Overview.previous(), DashboardMode::Plan);
        assert_eq!(DashboardMode::Risks.index(), 3);
    }

    #[test]
    fn share_percentages_round_each_slice() {
        let data = DashboardData::nayabnb();
        let shares = share_percentages(&data.traffic);
        assert_eq!(shares[0], ("returning followers".to_string(), 52));
        assert!(share_percentages(&[]).is_empty());
        let zero = [ShareSlice {
            name: "none".into(),
            value: 0,
        }];
        assert_eq!(share_percentages(&zero)[0].1, 0);
    }

    #[test]
    fn tiles_serialize_with_type_tag() {
        let data = DashboardData::nayabnb();
        let view = DashboardView::build(&data, &SnapshotState::NoData, TrendRange::Month, None);
        let json = serde_json::to_value(&view.tiles[1]).unwrap();
        assert_eq!(json["type"], "viewers");
        assert_eq!(json["tile"]["label"], AVERAGE_VIEWERS_LABEL);
    }
}
