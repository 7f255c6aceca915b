use serde::Serialize;

use crate::models::metrics::ChannelCounters;

/// Below this spend a channel is never killed; early data is too thin.
pub const KILL_SPEND_FLOOR: f64 = 300.0;
pub const KILL_CTR_BELOW: f64 = 0.9;
pub const KILL_ACTIVATION_BELOW: f64 = 20.0;
pub const KILL_CPA_PAID_ABOVE: f64 = 600.0;

pub const SCALE_CTR_MIN: f64 = 1.6;
pub const SCALE_ACTIVATION_MIN: f64 = 35.0;
pub const SCALE_CPA_PAID_MAX: f64 = 350.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Kill,
    Watch,
    Scale,
}

/// Derived ratios for one channel. Percentages are 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChannelKpis {
    pub ctr: f64,
    pub cpa_start: f64,
    pub activation_rate: f64,
    pub cpa_paid: f64,
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

pub fn kpis(c: &ChannelCounters) -> ChannelKpis {
    ChannelKpis {
        ctr: ratio(c.clicks as f64, c.impressions) * 100.0,
        cpa_start: ratio(c.spend, c.signups),
        activation_rate: ratio(c.activations as f64, c.signups) * 100.0,
        cpa_paid: ratio(c.spend, c.paid),
    }
}

/// Kill is checked first, so a channel that meets both rules is killed.
pub fn classify(spend: f64, k: &ChannelKpis) -> Signal {
    let underperforming = k.ctr < KILL_CTR_BELOW
        || k.activation_rate < KILL_ACTIVATION_BELOW
        || k.cpa_paid > KILL_CPA_PAID_ABOVE;
    if spend >= KILL_SPEND_FLOOR && underperforming {
        return Signal::Kill;
    }
    // cpa_paid of 0 means no paid conversions yet, which must not block scaling.
    let paid_ok = k.cpa_paid == 0.0 || k.cpa_paid <= SCALE_CPA_PAID_MAX;
    if k.ctr >= SCALE_CTR_MIN && k.activation_rate >= SCALE_ACTIVATION_MIN && paid_ok {
        return Signal::Scale;
    }
    Signal::Watch
}

pub fn signal(c: &ChannelCounters) -> Signal {
    classify(c.spend, &kpis(c))
}

pub fn evaluate(c: &ChannelCounters) -> (ChannelKpis, Signal) {
    let k = kpis(c);
    (k, classify(c.spend, &k))
}
