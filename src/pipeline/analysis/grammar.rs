// Markdown-section grammar for completion text: five headed sections,
// a bracketed tier marker, bullet lists and numbered hospital entries.

use std::sync::LazyLock;

use regex::Regex;

use super::assemble::DEFAULT_RISK_SUMMARY;
use super::output_validation::MIN_SUMMARY_LENGTH;
use super::types::{PartialAnalysis, RecommendedHospital, ResponseGrammar, RiskLevel};

static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•・·+]|\d{1,2}[.)、])\s*").expect("Invalid bullet regex")
});

static NUMBERED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,2}[.)、]").expect("Invalid numbered regex"));

static HOSPITAL_LOCATION_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<head>.+?)\s*(?:\s[-–|]\s|[:：])\s*(?P<loc>.+)$")
        .expect("Invalid hospital regex")
});

static LOCALIZED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)\s*[（(](?P<local>[^）)]+)[）)]\s*$").expect("Invalid name regex")
});

static BRACKET_TIER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)【[高中低]】|\[(?:high|medium|low)\]").expect("Invalid marker regex")
});

const HIGH_MARKERS: &[&str] = &["【高】", "[high]", "高風險", "高风险", "high risk"];
const MEDIUM_MARKERS: &[&str] = &[
    "【中】",
    "[medium]",
    "中風險",
    "中等風險",
    "中风险",
    "中等风险",
    "moderate risk",
    "medium risk",
];
const LOW_MARKERS: &[&str] = &["【低】", "[low]", "低風險", "低风险", "low risk"];

const FEATURE_KEYS: &[&str] = &["特色", "特點", "特点", "features", "specialties"];
const SUITABILITY_KEYS: &[&str] = &["適合", "适合", "suitable for", "best for"];
const LOCATION_KEYS: &[&str] = &["地點", "地点", "位置", "所在地", "location"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Risk,
    Tests,
    Treatment,
    Hospitals,
    NextSteps,
}

impl Section {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Risk => &[
                "健康風險評估",
                "健康风险评估",
                "風險評估",
                "风险评估",
                "risk assessment",
                "health risk",
            ],
            Self::Tests => &[
                "建議檢查項目",
                "建议检查项目",
                "建議檢查",
                "建议检查",
                "推薦檢查",
                "recommended tests",
                "recommended examinations",
                "suggested tests",
            ],
            Self::Treatment => &[
                "日本先端治療建議",
                "日本先端治疗建议",
                "治療建議",
                "治疗建议",
                "先端治療",
                "treatment suggestions",
                "treatment options",
                "advanced treatment",
            ],
            Self::Hospitals => &[
                "推薦醫療機構",
                "推荐医疗机构",
                "醫療機構",
                "医疗机构",
                "推薦醫院",
                "推荐医院",
                "recommended hospitals",
                "medical facilities",
                "hospitals",
            ],
            Self::NextSteps => &["下一步建議", "下一步建议", "下一步", "next steps"],
        }
    }

    const ALL: [Section; 5] = [
        Section::Risk,
        Section::Tests,
        Section::Treatment,
        Section::Hospitals,
        Section::NextSteps,
    ];
}

#[derive(Default)]
struct SectionBodies<'a> {
    preamble: Vec<&'a str>,
    risk: Vec<&'a str>,
    tests: Vec<&'a str>,
    treatment: Vec<&'a str>,
    hospitals: Vec<&'a str>,
    next_steps: Vec<&'a str>,
}

impl<'a> SectionBodies<'a> {
    fn push(&mut self, section: Option<Section>, line: &'a str) {
        let target = match section {
            None => &mut self.preamble,
            Some(Section::Risk) => &mut self.risk,
            Some(Section::Tests) => &mut self.tests,
            Some(Section::Treatment) => &mut self.treatment,
            Some(Section::Hospitals) => &mut self.hospitals,
            Some(Section::NextSteps) => &mut self.next_steps,
        };
        target.push(line);
    }
}

/// Default grammar for the screening prompt's section layout.
///
/// Total: any text yields a partial result. Missing sections leave their
/// lists empty; the summary is backfilled when too short to be useful.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownSectionGrammar;

impl ResponseGrammar for MarkdownSectionGrammar {
    fn parse(&self, raw: &str) -> PartialAnalysis {
        let bodies = split_sections(raw);

        let tier_source = if bodies.risk.iter().any(|l| !l.trim().is_empty()) {
            bodies.risk.join("\n")
        } else {
            raw.to_string()
        };

        PartialAnalysis {
            risk_level: detect_risk_level(&tier_source),
            risk_summary: extract_summary(&bodies),
            recommended_tests: parse_list(&bodies.tests),
            treatment_suggestions: parse_list(&bodies.treatment),
            recommended_hospitals: parse_hospitals(&bodies.hospitals),
            next_steps: parse_list(&bodies.next_steps),
        }
    }
}

fn split_sections(raw: &str) -> SectionBodies<'_> {
    let mut bodies = SectionBodies::default();
    let mut current = None;

    for line in raw.lines() {
        match classify_header(line) {
            Some(section) => current = Some(section),
            None => bodies.push(current, line),
        }
    }

    bodies
}

/// Recognize a section header: a `#`/bold line naming a section, or a bare
/// line that is exactly a section name.
fn classify_header(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let decorated = trimmed.starts_with('#') || trimmed.starts_with("**");
    let text = trimmed
        .trim_start_matches('#')
        .replace("**", "")
        .trim()
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase();

    if text.is_empty() || text.chars().count() > 40 {
        return None;
    }

    Section::ALL.into_iter().find(|section| {
        section.aliases().iter().any(|alias| {
            if decorated {
                text.contains(alias)
            } else {
                text == *alias
            }
        })
    })
}

/// First tier found in precedence order high, medium, low.
pub fn detect_risk_level(text: &str) -> Option<RiskLevel> {
    let lowered = text.to_lowercase();
    let has_any = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if has_any(HIGH_MARKERS) {
        Some(RiskLevel::High)
    } else if has_any(MEDIUM_MARKERS) {
        Some(RiskLevel::Medium)
    } else if has_any(LOW_MARKERS) {
        Some(RiskLevel::Low)
    } else {
        None
    }
}

fn extract_summary(bodies: &SectionBodies<'_>) -> String {
    let from_risk = clean_summary(&bodies.risk);
    if from_risk.chars().count() > MIN_SUMMARY_LENGTH {
        return from_risk;
    }

    let from_preamble = clean_summary(&bodies.preamble);
    if from_preamble.chars().count() > MIN_SUMMARY_LENGTH {
        return from_preamble;
    }

    DEFAULT_RISK_SUMMARY.to_string()
}

fn clean_summary(lines: &[&str]) -> String {
    let joined = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let unmarked = BRACKET_TIER_MARKER.replace_all(&joined, "");
    unmarked
        .replace("**", "")
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | '-'))
        .trim()
        .to_string()
}

/// Strip bold markers and one bullet/number prefix.
fn strip_item_prefix(line: &str) -> String {
    let unbolded = line.replace("**", "");
    BULLET_PREFIX.replace(&unbolded, "").trim().to_string()
}

/// Only bulleted or numbered lines are items; lead-in prose is dropped.
fn parse_list(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| BULLET_PREFIX.is_match(&l.replace("**", "")))
        .map(|l| strip_item_prefix(l))
        .filter(|item| item.chars().any(char::is_alphanumeric))
        .collect()
}

enum HospitalField {
    Features(Vec<String>),
    Suitability(String),
    Location(String),
}

fn parse_hospital_field(content: &str) -> Option<HospitalField> {
    let value_after = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|key| {
            let head = content.get(..key.len())?;
            if !head.eq_ignore_ascii_case(key) {
                return None;
            }
            let rest = content[key.len()..].trim_start();
            let value = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：'))?;
            Some(value.trim().to_string())
        })
    };

    if let Some(value) = value_after(FEATURE_KEYS) {
        let features = value
            .split(['、', ',', '，', '/'])
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        return Some(HospitalField::Features(features));
    }
    if let Some(value) = value_after(SUITABILITY_KEYS) {
        return Some(HospitalField::Suitability(value));
    }
    value_after(LOCATION_KEYS).map(HospitalField::Location)
}

fn parse_hospital_entry(content: &str) -> RecommendedHospital {
    let (head, location) = match HOSPITAL_LOCATION_SPLIT.captures(content) {
        Some(caps) => (caps["head"].trim().to_string(), caps["loc"].trim().to_string()),
        None => (content.trim().to_string(), String::new()),
    };

    let (name, localized_name) = match LOCALIZED_NAME.captures(&head) {
        Some(caps) => (
            caps["name"].trim().to_string(),
            Some(caps["local"].trim().to_string()),
        ),
        None => (head, None),
    };

    RecommendedHospital {
        name,
        localized_name,
        location,
        features: Vec::new(),
        suitability: String::new(),
    }
}

fn parse_hospitals(lines: &[&str]) -> Vec<RecommendedHospital> {
    let mut hospitals: Vec<RecommendedHospital> = Vec::new();

    for line in lines {
        let content = strip_item_prefix(line);
        if content.is_empty() {
            continue;
        }

        if let Some(field) = parse_hospital_field(&content) {
            if let Some(current) = hospitals.last_mut() {
                match field {
                    HospitalField::Features(mut features) => current.features.append(&mut features),
                    HospitalField::Suitability(note) => current.suitability = note,
                    HospitalField::Location(location) => current.location = location,
                }
            }
            continue;
        }

        // Indented plain bullets under an entry are extra features
        let indented = line.starts_with([' ', '\t']) && !NUMBERED_PREFIX.is_match(line);
        match hospitals.last_mut() {
            Some(current) if indented => current.features.push(content),
            _ => hospitals.push(parse_hospital_entry(&content)),
        }
    }

    hospitals
}
