//! Static dashboard content: channel profile, KPI table, trend series and
//! strategy tables. Built once and handed to the view layer read-only.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::kpi::{KpiMetric, Normalizer};

pub const TREND_DAYS: usize = 90;

/// Key of the KPI holding the historical average concurrent viewers.
pub const AVG_CONCURRENT_KEY: &str = "avg_concurrent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub name: String,
    pub platform: String,
    pub stage: String,
    pub positioning: String,
    pub one_liner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: u32,
    pub acv: i64,
    pub followers: i64,
    pub clips: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSlice {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMix {
    pub kind: String,
    pub share: u32,
    pub stability: u32,
    pub growth: u32,
}

/// Content matrix bubble: x = growth, y = stability, z = share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixPoint {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAxis {
    pub subject: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub title: String,
    pub goal: String,
    pub bullets: Vec<String>,
    pub kpis: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendRange {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TrendRange {
    pub fn days(self) -> usize {
        match self {
            TrendRange::Week => 7,
            TrendRange::Month => 30,
            TrendRange::Quarter => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendRange::Week => "last 7 days",
            TrendRange::Month => "last 30 days",
            TrendRange::Quarter => "last 90 days",
        }
    }
}

impl FromStr for TrendRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(TrendRange::Week),
            "30d" => Ok(TrendRange::Month),
            "90d" => Ok(TrendRange::Quarter),
            other => Err(format!("unknown trend range '{other}'")),
        }
    }
}

/// Everything the dashboard shows besides the live snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub channel: ChannelProfile,
    pub kpis: Vec<KpiMetric>,
    pub trend: Vec<TrendPoint>,
    pub traffic: Vec<ShareSlice>,
    pub content_mix: Vec<ContentMix>,
    pub content_matrix: Vec<MatrixPoint>,
    pub risks: Vec<RiskAxis>,
    pub monetization: Vec<ShareSlice>,
    pub phases: Vec<PlanPhase>,
}

impl DashboardData {
    /// The tail of the trend series covering `range`.
    pub fn trend_window(&self, range: TrendRange) -> &[TrendPoint] {
        let start = self.trend.len().saturating_sub(range.days());
        &self.trend[start..]
    }

    pub fn kpi(&self, key: &str) -> Option<&KpiMetric> {
        self.kpis.iter().find(|kpi| kpi.key == key)
    }

    /// Historical average concurrent viewers, shown whenever no live count is available.
    pub fn historical_acv(&self) -> f64 {
        self.kpi(AVG_CONCURRENT_KEY)
            .map(|kpi| kpi.raw_value)
            .unwrap_or_default()
    }

    /// Rounded mean of the risk radar, 0 when there are no axes.
    pub fn risk_score(&self) -> u32 {
        if self.risks.is_empty() {
            return 0;
        }
        let total: u32 = self.risks.iter().map(|r| r.score).sum();
        (total as f64 / self.risks.len() as f64).round() as u32
    }

    /// Built-in data set for the `nayabnb` channel.
    pub fn nayabnb() -> Self {
        Self {
            channel: ChannelProfile {
                name: "nayabnb".into(),
                platform: "Twitch".into(),
                stage: "mid growth".into(),
                positioning: "companion-style interaction + main game".into(),
                one_liner: "Traffic is not the problem; the growth structure has not taken off yet."
                    .into(),
            },
            kpis: vec![
                KpiMetric::new(
                    "sub_growth",
                    0.18,
                    Normalizer::Ratio,
                    "subscriber growth",
                    "MoM",
                ),
                KpiMetric::new(
                    AVG_CONCURRENT_KEY,
                    315.0,
                    Normalizer::Linear {
                        min: 0.0,
                        max: 500.0,
                    },
                    "average concurrent viewers",
                    "ACV",
                ),
                KpiMetric::new(
                    "retention",
                    0.56,
                    Normalizer::Ratio,
                    "retention",
                    "Proxy",
                ),
                KpiMetric::new(
                    "chat_engagement",
                    0.62,
                    Normalizer::Ratio,
                    "chat engagement",
                    "Index",
                ),
                KpiMetric::new(
                    "monetization",
                    0.48,
                    Normalizer::Ratio,
                    "monetization efficiency",
                    "Index",
                )
                .with_warning("over-reliant on a single revenue source"),
            ],
            trend: generate_trend(TREND_DAYS),
            traffic: slices(&[
                ("returning followers", 52),
                ("platform recommendations", 33),
                ("external referrals", 15),
            ]),
            content_mix: vec![
                mix("main game", 46, 80, 58),
                mix("just chatting", 34, 78, 36),
                mix("special events", 12, 42, 84),
                mix("highlight clips", 8, 35, 76),
            ],
            content_matrix: vec![
                point("main game", 58, 80, 46),
                point("just chatting", 36, 78, 34),
                point("special events", 84, 42, 12),
                point("highlight clips", 76, 35, 8),
            ],
            risks: vec![
                risk("content fatigue", 68),
                risk("platform dependence", 62),
                risk("emotional burnout", 73),
                risk("copycat competition", 55),
                risk("growth ceiling", 70),
            ],
            monetization: slices(&[
                ("subscriptions", 55),
                ("tips", 22),
                ("ads", 13),
                ("sponsorships", 10),
            ]),
            phases: vec![
                phase(
                    "Phase 1 | Secure the base (1-2 months)",
                    "Raise new viewer penetration and retention",
                    &[
                        "Keep a fixed main content line",
                        "Ship at least 2 highlight clips per week",
                        "Fixed 60 second opening: topic, goal of the day, hook",
                    ],
                    &["retention +5~10%", "external referrals +20%", "ACV trending up"],
                ),
                phase(
                    "Phase 2 | Create breakout moments (3-6 months)",
                    "Build talking points and events",
                    &[
                        "Monthly challenge series and viewer-voted routes",
                        "Design clip-able segments: stakes, penalties, milestones",
                        "Collab roster: 70% peers, 30% larger channels",
                    ],
                    &[
                        "viral clips >= 2/month",
                        "new viewer share +15%",
                        "collab referrals +30%",
                    ],
                ),
                phase(
                    "Phase 3 | Brand building (6-12 months)",
                    "Solidify the IP and repeatable monetization",
                    &[
                        "Catchphrases, rituals, visual identity and sound cues",
                        "Test merchandise: emotes, goods, member perks",
                        "Community rules: welcome newcomers, lore glossary, comeback loops",
                    ],
                    &[
                        "collab/sponsor share >= 20%",
                        "member retention up",
                        "brand search volume up",
                    ],
                ),
            ],
        }
    }
}

impl Default for DashboardData {
    fn default() -> Self {
        Self::nayabnb()
    }
}

/// Rounds half towards positive infinity.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn generate_trend(days: usize) -> Vec<TrendPoint> {
    (0..days)
        .map(|i| {
            let x = i as f64;
            let wave = round_half_up(35.0 * (x / 4.0).sin());
            TrendPoint {
                day: i as u32 + 1,
                acv: round_half_up(260.0 + x * 1.2 + wave as f64),
                followers: 40 + round_half_up(8.0 * (x / 3.0).sin() + x * 0.2),
                clips: round_half_up(6.0 + 2.0 * (x / 2.0).sin()).max(0),
            }
        })
        .collect()
}

fn slices(entries: &[(&str, u32)]) -> Vec<ShareSlice> {
    entries
        .iter()
        .map(|(name, value)| ShareSlice {
            name: (*name).into(),
            value: *value,
        })
        .collect()
}

fn mix(kind: &str, share: u32, stability: u32, growth: u32) -> ContentMix {
    ContentMix {
        kind: kind.into(),
        share,
        stability,
        growth,
    }
}

fn point(name: &str, x: u32, y: u32, z: u32) -> MatrixPoint {
    MatrixPoint {
        name: name.into(),
        x,
        y,
        z,
    }
}

fn risk(subject: &str, score: u32) -> RiskAxis {
    RiskAxis {
        subject: subject.into(),
        score,
    }
}

fn phase(title: &str, goal: &str, bullets: &[&str], kpis: &[&str]) -> PlanPhase {
    PlanPhase {
        title: title.into(),
        goal: goal.into(),
        bullets: bullets.iter().map(|b| (*b).into()).collect(),
        kpis: kpis.iter().map(|k| (*k).into()).collect(),
    }
}
