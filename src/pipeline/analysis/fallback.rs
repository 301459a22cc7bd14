// Deterministic rule-based analysis, used whenever the AI path fails or
// is rejected. Scores topic keywords in the raw answers; never leaves the process.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use super::assemble::finalize;
use super::negation::{contains_unnegated_keyword, is_negative_answer, mentions_keyword};
use super::types::{
    AnalysisResult, AnalysisSource, PartialAnalysis, RecommendedHospital, RiskLevel,
    ScreeningAnswer,
};
use crate::config::OutputLimits;

/// Stored as `raw_content` for rule-based results.
pub const FALLBACK_RAW_CONTENT: &str = "[rule-based fallback analysis]";

pub const HIGH_RISK_THRESHOLD: u32 = 6;
pub const MEDIUM_RISK_THRESHOLD: u32 = 3;

static AGE_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bage\b|how old|年齡|年龄|年齢|歲|岁|歳").expect("Invalid age regex")
});

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}").expect("Invalid number regex"));

const FAMILY_KEYWORDS: &[&str] = &[
    "family", "father", "mother", "parent", "sibling", "家族", "家人", "家屬", "家属", "親屬",
    "亲属", "遺傳", "遗传", "父", "母",
];

const SMOKING_KEYWORDS: &[&str] = &[
    "smok", "cigarette", "tobacco", "vape", "吸菸", "抽菸", "吸烟", "抽烟", "香菸", "香烟", "喫煙",
    "タバコ", "たばこ",
];

const ALCOHOL_KEYWORDS: &[&str] = &[
    "alcohol", "drink", "beer", "wine", "sake", "liquor", "飲酒", "喝酒", "酒精", "お酒", "飲み",
];

const AFFIRMATIVE_TOKENS: &[&str] = &[
    "yes", "daily", "occasionally", "sometimes", "regularly", "often", "socially", "weekly",
    "current", "currently",
];

const AFFIRMATIVE_PREFIXES_CJK: &[&str] = &[
    "是", "有", "每天", "每日", "偶爾", "偶尔", "經常", "经常", "はい", "毎日", "時々", "ときどき",
];

/// Which catalog facility a risk topic points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HospitalFocus {
    Oncology,
    Cardiology,
    General,
}

/// Static catalog of facilities recommended by the rule-based path.
pub fn hospital_for(focus: HospitalFocus) -> RecommendedHospital {
    match focus {
        HospitalFocus::Oncology => catalog_entry(
            "National Cancer Center Hospital East",
            "国立がん研究センター東病院",
            "Kashiwa, Chiba",
            &["Proton beam therapy", "Cancer screening", "Clinical trials"],
            "Patients with cancer warning signs or a family history of cancer",
        ),
        HospitalFocus::Cardiology => catalog_entry(
            "National Cerebral and Cardiovascular Center",
            "国立循環器病研究センター",
            "Suita, Osaka",
            &["Cardiac imaging", "Stroke care", "Catheter intervention"],
            "Patients with cardiovascular risk factors or symptoms",
        ),
        HospitalFocus::General => catalog_entry(
            "St. Luke's International Hospital",
            "聖路加国際病院",
            "Chuo, Tokyo",
            &["Comprehensive health checkup", "English-speaking staff", "Preventive medicine"],
            "General health screening for international patients",
        ),
    }
}

fn catalog_entry(
    name: &str,
    localized: &str,
    location: &str,
    features: &[&str],
    suitability: &str,
) -> RecommendedHospital {
    RecommendedHospital {
        name: name.to_string(),
        localized_name: Some(localized.to_string()),
        location: location.to_string(),
        features: features.iter().map(|f| f.to_string()).collect(),
        suitability: suitability.to_string(),
    }
}

/// One scored topic: its weight and what it adds to the result.
struct TopicRule {
    factor: &'static str,
    weight: u32,
    keywords: &'static [&'static str],
    tests: &'static [&'static str],
    treatments: &'static [&'static str],
    focus: Option<HospitalFocus>,
}

const AGE_SENIOR: TopicRule = TopicRule {
    factor: "Age 60 or older",
    weight: 3,
    keywords: &[],
    tests: &["Comprehensive health checkup (Ningen Dock)", "Bone density scan"],
    treatments: &[],
    focus: None,
};

const AGE_MIDDLE: TopicRule = TopicRule {
    factor: "Age 40 to 59",
    weight: 1,
    keywords: &[],
    tests: &["Comprehensive health checkup (Ningen Dock)"],
    treatments: &[],
    focus: None,
};

const FAMILY_RULES: &[TopicRule] = &[
    TopicRule {
        factor: "Family history of cancer",
        weight: 3,
        keywords: &["cancer", "tumor", "tumour", "carcinoma", "癌", "腫瘤", "肿瘤", "がん"],
        tests: &["PET-CT whole-body cancer screening", "Tumor marker panel"],
        treatments: &["Proton beam therapy consultation", "Cancer immunotherapy evaluation"],
        focus: Some(HospitalFocus::Oncology),
    },
    TopicRule {
        factor: "Family history of cardiovascular disease",
        weight: 2,
        keywords: &[
            "heart", "cardiac", "stroke", "hypertension", "心臟", "心脏", "心血管", "中風", "中风",
            "高血壓", "高血压", "心臓", "脳卒中", "高血圧",
        ],
        tests: &["Cardiac ultrasound", "Coronary CT angiography"],
        treatments: &["Catheter-based cardiac intervention assessment"],
        focus: Some(HospitalFocus::Cardiology),
    },
    TopicRule {
        factor: "Family history of diabetes",
        weight: 1,
        keywords: &["diabetes", "糖尿"],
        tests: &["HbA1c", "Fasting blood glucose"],
        treatments: &[],
        focus: None,
    },
];

const SMOKING_RULE: TopicRule = TopicRule {
    factor: "Active smoking",
    weight: 2,
    keywords: SMOKING_KEYWORDS,
    tests: &["Low-dose chest CT", "Pulmonary function test"],
    treatments: &["Smoking cessation program"],
    focus: None,
};

const ALCOHOL_RULE: TopicRule = TopicRule {
    factor: "Regular alcohol consumption",
    weight: 1,
    keywords: ALCOHOL_KEYWORDS,
    tests: &["Liver function panel", "Abdominal ultrasound"],
    treatments: &["Alcohol reduction counselling"],
    focus: None,
};

const CONDITION_RULES: &[TopicRule] = &[
    TopicRule {
        factor: "Possible cancer warning signs",
        weight: 3,
        keywords: &[
            "blood in stool", "bloody stool", "weight loss", "lump", "血便", "體重減輕", "体重减轻",
            "体重減少", "腫塊", "肿块", "しこり",
        ],
        tests: &["Upper and lower GI endoscopy", "Tumor marker panel"],
        treatments: &["Cancer immunotherapy evaluation"],
        focus: Some(HospitalFocus::Oncology),
    },
    TopicRule {
        factor: "Cardiopulmonary symptoms",
        weight: 2,
        keywords: &[
            "chest pain", "palpitation", "shortness of breath", "胸痛", "胸悶", "胸闷", "心悸",
            "呼吸困難", "呼吸困难", "動悸", "息切れ",
        ],
        tests: &["Electrocardiogram (ECG)", "Cardiac ultrasound"],
        treatments: &[],
        focus: Some(HospitalFocus::Cardiology),
    },
    TopicRule {
        factor: "Persistent general symptoms",
        weight: 1,
        keywords: &[
            "fatigue", "headache", "dizziness", "cough", "疲勞", "疲劳", "頭痛", "头痛", "頭暈",
            "头晕", "咳嗽", "倦怠", "めまい",
        ],
        tests: &["Complete blood count", "Chest X-ray"],
        treatments: &[],
        focus: None,
    },
    TopicRule {
        factor: "Existing metabolic or cardiovascular condition",
        weight: 2,
        keywords: &[
            "diabetes", "hypertension", "high blood pressure", "cholesterol", "糖尿病", "高血壓",
            "高血压", "高血脂", "高血圧", "脂質異常",
        ],
        tests: &["HbA1c", "Lipid panel"],
        treatments: &["Lifestyle and metabolic management program"],
        focus: Some(HospitalFocus::Cardiology),
    },
    TopicRule {
        factor: "Other chronic condition",
        weight: 1,
        keywords: &["hepatitis", "kidney", "asthma", "copd", "肝炎", "腎", "肾", "氣喘", "哮喘", "喘息"],
        tests: &["Liver and kidney function panel"],
        treatments: &[],
        focus: None,
    },
];

/// Score and findings accumulated over one answer set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskAssessment {
    pub score: u32,
    pub factors: Vec<String>,
    pub tests: Vec<String>,
    pub treatments: Vec<String>,
    pub focuses: Vec<HospitalFocus>,
}

impl RiskAssessment {
    /// Apply a rule once; repeated matches of the same topic add nothing.
    fn apply(&mut self, rule: &TopicRule) {
        if self.factors.iter().any(|f| f == rule.factor) {
            return;
        }
        self.score += rule.weight;
        self.factors.push(rule.factor.to_string());
        self.tests.extend(rule.tests.iter().map(|t| t.to_string()));
        self.treatments.extend(rule.treatments.iter().map(|t| t.to_string()));
        if let Some(focus) = rule.focus {
            if !self.focuses.contains(&focus) {
                self.focuses.push(focus);
            }
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        score_to_level(self.score)
    }
}

pub fn score_to_level(score: u32) -> RiskLevel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn answer_text(answer: &ScreeningAnswer) -> String {
    match &answer.note {
        Some(note) => format!("{} {}", answer.answer.rendered(), note),
        None => answer.answer.rendered(),
    }
}

fn parse_age(text: &str) -> Option<u32> {
    FIRST_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|age| (1..=120).contains(age))
}

fn is_affirmative_answer(text: &str) -> bool {
    if is_negative_answer(text) {
        return false;
    }
    let lowered = text.trim().to_lowercase();
    let first_token = lowered
        .split(|c: char| !c.is_alphanumeric())
        .find(|t| !t.is_empty())
        .unwrap_or("");
    AFFIRMATIVE_TOKENS.contains(&first_token)
        || AFFIRMATIVE_PREFIXES_CJK.iter().any(|p| lowered.starts_with(p))
}

/// A topic counts when the answer names it without negation, or when the
/// question asks about it and the answer is affirmative ("Do you smoke?" / "Yes").
fn topic_match(question: &str, answer: &str, keywords: &[&str]) -> bool {
    contains_unnegated_keyword(answer, keywords)
        || (contains_unnegated_keyword(question, keywords) && is_affirmative_answer(answer))
}

/// Score an answer set. Pure and deterministic.
pub fn assess_risk(answers: &[ScreeningAnswer]) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    for answer in answers {
        let question = &answer.question;
        let text = answer_text(answer);

        if AGE_QUESTION.is_match(question) || answer.question_id.eq_ignore_ascii_case("age") {
            match parse_age(&text) {
                Some(age) if age >= 60 => assessment.apply(&AGE_SENIOR),
                Some(age) if age >= 40 => assessment.apply(&AGE_MIDDLE),
                _ => {}
            }
            continue;
        }

        if is_negative_answer(&text) {
            continue;
        }

        let family_context = mentions_keyword(question, FAMILY_KEYWORDS)
            || mentions_keyword(&answer.question_id, FAMILY_KEYWORDS)
            || mentions_keyword(&text, FAMILY_KEYWORDS);
        if family_context {
            for rule in FAMILY_RULES {
                if topic_match(question, &text, rule.keywords) {
                    assessment.apply(rule);
                }
            }
            continue;
        }

        if topic_match(question, &text, SMOKING_KEYWORDS) {
            assessment.apply(&SMOKING_RULE);
        }
        if topic_match(question, &text, ALCOHOL_KEYWORDS) {
            assessment.apply(&ALCOHOL_RULE);
        }
        for rule in CONDITION_RULES {
            if topic_match(question, &text, rule.keywords) {
                assessment.apply(rule);
            }
        }
    }

    assessment
}

fn summary_for(level: RiskLevel, factors: &[String]) -> String {
    let headline = match level {
        RiskLevel::High => "Standard screening guidance indicates an elevated (high) risk level.",
        RiskLevel::Medium => "Standard screening guidance indicates a moderate risk level.",
        RiskLevel::Low => "Standard screening guidance indicates a low risk level.",
    };

    if factors.is_empty() {
        format!("{headline} No specific risk factors were identified from the answers provided.")
    } else {
        format!("{headline} Identified risk factors: {}.", factors.join("; "))
    }
}

fn next_steps_for(level: RiskLevel) -> Vec<String> {
    let steps: &[&str] = match level {
        RiskLevel::High => &[
            "Book a comprehensive screening within the next month",
            "Consult a specialist about the identified risk factors",
            "Prepare previous medical records and family history details",
        ],
        RiskLevel::Medium => &[
            "Schedule a comprehensive health screening within three months",
            "Review lifestyle factors with a physician",
        ],
        RiskLevel::Low => &[
            "Maintain annual health checkups",
            "Continue healthy lifestyle habits",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// Produce a complete rule-based result for a validated answer set.
pub fn analyze_with_rules(
    answers: &[ScreeningAnswer],
    request_id: Uuid,
    limits: &OutputLimits,
) -> AnalysisResult {
    let assessment = assess_risk(answers);
    let level = assessment.risk_level();

    let mut hospitals: Vec<RecommendedHospital> =
        assessment.focuses.iter().map(|f| hospital_for(*f)).collect();
    hospitals.push(hospital_for(HospitalFocus::General));

    tracing::info!(
        request_id = %request_id,
        score = assessment.score,
        risk_level = %level,
        factor_count = assessment.factors.len(),
        "Rule-based analysis completed"
    );

    let partial = PartialAnalysis {
        risk_level: Some(level),
        risk_summary: summary_for(level, &assessment.factors),
        recommended_tests: assessment.tests,
        treatment_suggestions: assessment.treatments,
        recommended_hospitals: hospitals,
        next_steps: next_steps_for(level),
    };

    let raw_content = format!("{FALLBACK_RAW_CONTENT} score={}", assessment.score);
    finalize(partial, AnalysisSource::RuleBased, raw_content, request_id, limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::assemble::DEFAULT_TESTS;
    use crate::pipeline::analysis::output_validation::validate_output;

    fn answer(id: &str, question: &str, text: &str) -> ScreeningAnswer {
        ScreeningAnswer::new(id, question, text)
    }

    fn analyze(answers: &[ScreeningAnswer]) -> AnalysisResult {
        analyze_with_rules(answers, Uuid::new_v4(), &OutputLimits::default())
    }

    #[test]
    fn family_cancer_and_age_65_is_high_risk() {
        let answers = vec![
            answer("age", "What is your age?", "65"),
            answer("family_history", "Family medical history", "Cancer (father)"),
        ];
        let result = analyze(&answers);

        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result
            .recommended_tests
            .iter()
            .any(|t| t.to_lowercase().contains("cancer") || t.to_lowercase().contains("tumor")));
        assert!(result.is_fallback);
        assert_eq!(result.analysis_source, AnalysisSource::RuleBased);
        assert_eq!(result.recommended_hospitals[0].name, "National Cancer Center Hospital East");
        assert!(result.raw_content.starts_with(FALLBACK_RAW_CONTENT));
    }

    #[test]
    fn negated_smoking_adds_nothing() {
        let negated = assess_risk(&[answer("lifestyle", "Describe your habits", "I do not smoke")]);
        assert_eq!(negated.score, 0);
        assert!(negated.factors.is_empty());

        let active = assess_risk(&[answer("lifestyle", "Describe your habits", "I smoke every day")]);
        assert_eq!(active.score, 2);
        assert_eq!(active.factors, vec!["Active smoking"]);
    }

    #[test]
    fn quit_smoking_and_dont_drink_are_not_risks() {
        let assessment = assess_risk(&[
            answer("smoking", "Do you smoke?", "I quit smoking 5 years ago"),
            answer("alcohol", "Do you drink alcohol?", "I don't drink"),
        ]);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn affirmative_answer_to_lifestyle_question_counts() {
        let assessment = assess_risk(&[
            answer("smoking", "Do you smoke?", "Yes"),
            answer("alcohol", "您是否飲酒？", "每天"),
        ]);
        assert_eq!(assessment.score, 3);
        assert!(assessment.factors.contains(&"Regular alcohol consumption".to_string()));
    }

    #[test]
    fn yes_to_family_and_symptom_questions_counts() {
        let assessment = assess_risk(&[
            answer("family_cancer", "Do you have a family history of cancer?", "Yes"),
            answer("chest_pain", "Do you have chest pain?", "Yes"),
            answer("smoking", "Do you smoke?", "Yes"),
        ]);
        assert_eq!(
            assessment.factors,
            vec!["Family history of cancer", "Cardiopulmonary symptoms", "Active smoking"]
        );
        assert_eq!(assessment.score, 7);
        assert_eq!(assessment.risk_level(), RiskLevel::High);
    }

    #[test]
    fn yes_to_chinese_condition_question_counts() {
        let assessment = assess_risk(&[answer("conditions", "您是否有糖尿病？", "有")]);
        assert_eq!(assessment.factors, vec!["Existing metabolic or cardiovascular condition"]);
    }

    #[test]
    fn non_affirmative_answer_to_condition_question_adds_nothing() {
        let assessment = assess_risk(&[answer("chest_pain", "Do you have chest pain?", "Not sure")]);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn bare_no_answer_is_ignored() {
        let assessment = assess_risk(&[
            answer("smoking", "Do you smoke?", "No"),
            answer("family", "Family history of cancer?", "No"),
            answer("symptoms", "Any chest pain?", "none"),
        ]);
        assert_eq!(assessment.score, 0);
    }

    #[test]
    fn topics_count_once() {
        let assessment = assess_risk(&[
            answer("family1", "Father's history", "lung cancer"),
            answer("family2", "Mother's history", "breast cancer"),
        ]);
        assert_eq!(assessment.score, 3);
    }

    #[test]
    fn family_answers_do_not_score_as_personal_conditions() {
        let assessment = assess_risk(&[answer("family", "Family medical history", "Diabetes, hypertension")]);
        assert_eq!(
            assessment.factors,
            vec!["Family history of cardiovascular disease", "Family history of diabetes"]
        );
        assert_eq!(assessment.score, 3);
    }

    #[test]
    fn score_thresholds_map_to_tiers() {
        assert_eq!(score_to_level(0), RiskLevel::Low);
        assert_eq!(score_to_level(2), RiskLevel::Low);
        assert_eq!(score_to_level(3), RiskLevel::Medium);
        assert_eq!(score_to_level(5), RiskLevel::Medium);
        assert_eq!(score_to_level(6), RiskLevel::High);
    }

    #[test]
    fn middle_age_with_symptoms_is_medium() {
        let result = analyze(&[
            answer("age", "年齡", "45歲"),
            answer("symptoms", "近期症狀", "胸悶、心悸"),
        ]);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(result.recommended_tests.contains(&"Electrocardiogram (ECG)".to_string()));
    }

    #[test]
    fn no_factors_yields_low_risk_with_defaults() {
        let result = analyze(&[answer("diet", "How is your diet?", "Balanced, lots of vegetables")]);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(
            result.recommended_tests,
            DEFAULT_TESTS.iter().map(|t| t.to_string()).collect::<Vec<_>>()
        );
        assert!(!result.treatment_suggestions.is_empty());
        assert_eq!(result.recommended_hospitals.len(), 1);
        assert!(validate_output(&result));
    }

    #[test]
    fn japanese_answers_are_scored() {
        let assessment = assess_risk(&[
            answer("age", "年齢を教えてください", "70"),
            answer("lifestyle", "生活習慣", "毎日喫煙しています"),
        ]);
        assert_eq!(assessment.score, 5);
        assert_eq!(assessment.risk_level(), RiskLevel::Medium);
    }

    #[test]
    fn fallback_output_is_deterministic() {
        let answers = vec![
            answer("age", "What is your age?", "62"),
            answer("smoking", "Do you smoke?", "daily"),
        ];
        let id = Uuid::new_v4();
        let a = analyze_with_rules(&answers, id, &OutputLimits::default());
        let b = analyze_with_rules(&answers, id, &OutputLimits::default());
        assert_eq!(a, b);
    }
}
