use crate::config::ClassifierRules;
use crate::domain::ports::SmsClassifier;
use crate::domain::sms::ParsedSmsResult;
use crate::error::Result;
use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// An outcome keyword only counts when it follows a transaction mention.
const OUTCOME_ANCHOR: &str = r"(?:txn|transaction)";
const AMOUNT_PATTERN: &str = r"(?i)(?:₹|\bINR|\bRs\.?)\s*(\d+(?:,\d+)*(?:\.\d{1,2})?)";
const REFERENCE_LABELS: &str = r"UPI\s*(?:Ref(?:erence)?|Txn)\.?\s*(?:No\.?|ID|#)?|UTR\s*(?:No\.?)?";
const VPA_PATTERN: &str = r"(?i)[a-z0-9._-]+@[a-z][a-z0-9.-]+";

/// Keyword and regex driven classifier for bank confirmation SMS.
///
/// Classification runs in three passes:
///
/// 1. A cheap relevance filter on lowercase substrings, so OTPs and marketing
///    never reach the regex passes.
/// 2. Outcome detection. When a message reads as both success and failure
///    (e.g. a reversal notice quoting the original success), failure wins so a
///    reversal is never reported as a completed payment.
/// 3. Best-effort extraction of amount, reference and VPA. A field that does
///    not parse is dropped; the message is still classified.
#[derive(Debug, Clone)]
pub struct RegexSmsClassifier {
    relevance_tokens: Vec<String>,
    success: Option<Regex>,
    failure: Option<Regex>,
    amount: Regex,
    reference: Regex,
    vpa: Regex,
}

impl RegexSmsClassifier {
    /// Builds a classifier with the stock rules.
    pub fn new() -> Result<Self> {
        Self::from_rules(&ClassifierRules::default())
    }

    pub fn from_rules(rules: &ClassifierRules) -> Result<Self> {
        let relevance_tokens = rules
            .relevance_tokens
            .iter()
            .map(|token| token.trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        let mut labels = REFERENCE_LABELS.to_string();
        for label in rules.extra_reference_labels.iter().map(|l| l.trim()) {
            if !label.is_empty() {
                labels.push('|');
                labels.push_str(&regex::escape(label));
            }
        }

        Ok(Self {
            relevance_tokens,
            success: outcome_pattern(&rules.success_keywords)?,
            failure: outcome_pattern(&rules.failure_keywords)?,
            amount: Regex::new(AMOUNT_PATTERN)?,
            reference: Regex::new(&format!(
                r"(?i:{labels})[\s:#.\-]*([A-Za-z0-9]{{10,18}})\b"
            ))?,
            vpa: Regex::new(VPA_PATTERN)?,
        })
    }

    fn is_relevant(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.relevance_tokens
            .iter()
            .any(|token| lower.contains(token.as_str()))
    }

    fn extract_amount(&self, text: &str) -> Option<Decimal> {
        let digits = self.amount.captures(text)?.get(1)?.as_str().replace(',', "");
        match Decimal::from_str(&digits) {
            Ok(amount) => Some(amount.normalize()),
            Err(e) => {
                debug!(%digits, error = %e, "amount not representable, skipping");
                None
            }
        }
    }

    fn extract_reference(&self, text: &str) -> Option<String> {
        // A label followed by a plain word ("UPI Txn successful") is not a reference.
        self.reference
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|token| token.bytes().any(|b| b.is_ascii_digit()))
            .map(str::to_ascii_uppercase)
    }

    fn extract_vpa(&self, text: &str) -> Option<String> {
        // Sentence punctuation right after the domain is not part of it.
        self.vpa
            .find(text)
            .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
    }
}

impl SmsClassifier for RegexSmsClassifier {
    fn classify(&self, text: &str) -> Option<ParsedSmsResult> {
        if !self.is_relevant(text) {
            debug!("sms has no payment keywords, ignoring");
            return None;
        }

        let is_success = self.success.as_ref().is_some_and(|re| re.is_match(text));
        let is_failure = self.failure.as_ref().is_some_and(|re| re.is_match(text));
        if !is_success && !is_failure {
            debug!("payment sms without a recognizable outcome, ignoring");
            return None;
        }

        Some(ParsedSmsResult {
            success: !is_failure,
            amount: self.extract_amount(text),
            transaction_ref: self.extract_reference(text),
            vpa: self.extract_vpa(text),
            raw_message: text.to_string(),
            timestamp: Utc::now(),
        })
    }
}

/// `txn|transaction` followed, anywhere later in the message, by a word that
/// starts with one of `keywords` ("successfully" counts as "successful").
fn outcome_pattern(keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"(?is){OUTCOME_ANCHOR}.*\b(?:{})", alternatives.join("|"));
    Ok(Some(Regex::new(&pattern)?))
}
