//! Prior distributions for calibrated parameters.
//!
//! Priors are configured as a `(family, args, kwargs)` triple ([`PriorSpec`])
//! and resolved into the closed [`Prior`] enumeration when the configuration is
//! parsed. Unknown families and bad arguments are rejected at that point rather
//! than at the first likelihood evaluation.
use crate::{error::EmuError, Real, Result, INF, NAN};
use rand::Rng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{self as sd, Continuous, ContinuousCDF};
use std::{collections::BTreeMap, convert::TryFrom, f64::consts::LN_2};

/// Supported prior distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriorSpec", into = "PriorSpec")]
pub enum Prior {
    Normal { loc: Real, scale: Real },
    HalfNormal { scale: Real },
    LogNormal { loc: Real, scale: Real },
    Uniform { low: Real, high: Real },
    Gamma { concentration: Real, rate: Real },
    Beta { concentration1: Real, concentration0: Real },
    TruncatedNormal { loc: Real, scale: Real, low: Real, high: Real },
}

/// Untyped prior description: a family name plus positional and keyword
/// arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorSpec {
    pub family: String,
    pub args: Vec<Real>,
    pub kwargs: BTreeMap<String, Real>,
}

impl PriorSpec {
    pub fn new(family: &str, args: &[Real]) -> Self {
        PriorSpec {
            family: family.to_string(),
            args: args.to_vec(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn kwarg(mut self, name: &str, value: Real) -> Self {
        self.kwargs.insert(name.to_string(), value);
        self
    }
}

/// Argument names and defaults for each family, in positional order.
fn signature(family: &str) -> Option<&'static [(&'static str, Option<Real>)]> {
    let sig: &'static [(&'static str, Option<Real>)] = match family {
        "Normal" => &[("loc", Some(0.0)), ("scale", Some(1.0))],
        "HalfNormal" => &[("scale", Some(1.0))],
        "LogNormal" => &[("loc", Some(0.0)), ("scale", Some(1.0))],
        "Uniform" => &[("low", Some(0.0)), ("high", Some(1.0))],
        "Gamma" => &[("concentration", None), ("rate", Some(1.0))],
        "Beta" => &[("concentration1", None), ("concentration0", None)],
        "TruncatedNormal" => &[
            ("loc", Some(0.0)),
            ("scale", Some(1.0)),
            ("low", Some(-INF)),
            ("high", Some(INF)),
        ],
        _ => return None,
    };
    Some(sig)
}

impl Prior {
    /// Resolve a prior from its untyped description.
    pub fn from_spec(spec: &PriorSpec) -> Result<Self> {
        let family = spec.family.as_str();
        let sig = signature(family)
            .ok_or_else(|| EmuError::UnknownDistribution(spec.family.clone()))?;
        if spec.args.len() > sig.len() {
            return Err(EmuError::invalid_prior(
                family,
                format!("expected at most {} arguments, got {}", sig.len(), spec.args.len()),
            ));
        }
        for key in spec.kwargs.keys() {
            match sig.iter().position(|(name, _)| name == key) {
                None => {
                    return Err(EmuError::invalid_prior(family, format!("unknown argument '{}'", key)))
                }
                Some(i) if i < spec.args.len() => {
                    return Err(EmuError::invalid_prior(
                        family,
                        format!("argument '{}' given twice", key),
                    ))
                }
                _ => (),
            }
        }

        let mut values = Vec::with_capacity(sig.len());
        for (i, (name, default)) in sig.iter().enumerate() {
            let value = spec
                .args
                .get(i)
                .or_else(|| spec.kwargs.get(*name))
                .cloned()
                .or(*default)
                .ok_or_else(|| EmuError::invalid_prior(family, format!("missing argument '{}'", name)))?;
            values.push(value);
        }

        let prior = match family {
            "Normal" => Prior::Normal { loc: values[0], scale: values[1] },
            "HalfNormal" => Prior::HalfNormal { scale: values[0] },
            "LogNormal" => Prior::LogNormal { loc: values[0], scale: values[1] },
            "Uniform" => Prior::Uniform { low: values[0], high: values[1] },
            "Gamma" => Prior::Gamma { concentration: values[0], rate: values[1] },
            "Beta" => Prior::Beta { concentration1: values[0], concentration0: values[1] },
            _ => Prior::TruncatedNormal {
                loc: values[0],
                scale: values[1],
                low: values[2],
                high: values[3],
            },
        };
        prior.validate()?;
        Ok(prior)
    }

    /// Untyped description of self, with every argument given by keyword.
    pub fn to_spec(&self) -> PriorSpec {
        let family = self.family();
        let mut spec = PriorSpec::new(family, &[]);
        let names = signature(family).unwrap_or(&[]);
        for ((name, _), value) in names.iter().zip(self.args()) {
            spec.kwargs.insert(name.to_string(), value);
        }
        spec
    }

    /// Family name as used in configuration files.
    pub fn family(&self) -> &'static str {
        match self {
            Prior::Normal { .. } => "Normal",
            Prior::HalfNormal { .. } => "HalfNormal",
            Prior::LogNormal { .. } => "LogNormal",
            Prior::Uniform { .. } => "Uniform",
            Prior::Gamma { .. } => "Gamma",
            Prior::Beta { .. } => "Beta",
            Prior::TruncatedNormal { .. } => "TruncatedNormal",
        }
    }

    fn args(&self) -> Vec<Real> {
        match *self {
            Prior::Normal { loc, scale } | Prior::LogNormal { loc, scale } => vec![loc, scale],
            Prior::HalfNormal { scale } => vec![scale],
            Prior::Uniform { low, high } => vec![low, high],
            Prior::Gamma { concentration, rate } => vec![concentration, rate],
            Prior::Beta { concentration1, concentration0 } => vec![concentration1, concentration0],
            Prior::TruncatedNormal { loc, scale, low, high } => vec![loc, scale, low, high],
        }
    }

    /// Check distribution parameters by building the corresponding statrs
    /// distribution.
    pub fn validate(&self) -> Result<()> {
        let family = self.family();
        let err = |e: &dyn std::fmt::Display| EmuError::invalid_prior(family, e);
        match *self {
            Prior::Normal { loc, scale } => sd::Normal::new(loc, scale).map(|_| ()).map_err(|e| err(&e)),
            Prior::HalfNormal { scale } => sd::Normal::new(0.0, scale).map(|_| ()).map_err(|e| err(&e)),
            Prior::LogNormal { loc, scale } => {
                sd::LogNormal::new(loc, scale).map(|_| ()).map_err(|e| err(&e))
            }
            Prior::Uniform { low, high } => sd::Uniform::new(low, high).map(|_| ()).map_err(|e| err(&e)),
            Prior::Gamma { concentration, rate } => {
                sd::Gamma::new(concentration, rate).map(|_| ()).map_err(|e| err(&e))
            }
            Prior::Beta { concentration1, concentration0 } => {
                sd::Beta::new(concentration1, concentration0).map(|_| ()).map_err(|e| err(&e))
            }
            Prior::TruncatedNormal { loc, scale, low, high } => {
                let normal = sd::Normal::new(loc, scale).map_err(|e| err(&e))?;
                if !(low < high) || normal.cdf(high) - normal.cdf(low) <= 0.0 {
                    return Err(err(&format!("empty truncation interval [{}, {}]", low, high)));
                }
                Ok(())
            }
        }
    }

    /// True if x lies in the support of the distribution.
    pub fn in_support(&self, x: Real) -> bool {
        match *self {
            Prior::Normal { .. } => x.is_finite(),
            Prior::HalfNormal { .. } => x >= 0.0 && x.is_finite(),
            Prior::LogNormal { .. } | Prior::Gamma { .. } => x > 0.0 && x.is_finite(),
            Prior::Uniform { low, high } => x >= low && x <= high,
            Prior::Beta { .. } => x > 0.0 && x < 1.0,
            Prior::TruncatedNormal { low, high, .. } => x >= low && x <= high && x.is_finite(),
        }
    }

    /// Log-density at x. Points outside the support have log-density -inf.
    pub fn ln_pdf(&self, x: Real) -> Real {
        if x.is_nan() {
            return NAN;
        }
        if !self.in_support(x) {
            return -INF;
        }
        let res = match *self {
            Prior::Normal { loc, scale } => sd::Normal::new(loc, scale).map(|d| d.ln_pdf(x)).ok(),
            Prior::HalfNormal { scale } => sd::Normal::new(0.0, scale).map(|d| LN_2 + d.ln_pdf(x)).ok(),
            Prior::LogNormal { loc, scale } => sd::LogNormal::new(loc, scale).map(|d| d.ln_pdf(x)).ok(),
            Prior::Uniform { low, high } => sd::Uniform::new(low, high).map(|d| d.ln_pdf(x)).ok(),
            Prior::Gamma { concentration, rate } => {
                sd::Gamma::new(concentration, rate).map(|d| d.ln_pdf(x)).ok()
            }
            Prior::Beta { concentration1, concentration0 } => sd::Beta::new(concentration1, concentration0)
                .map(|d| d.ln_pdf(x))
                .ok(),
            Prior::TruncatedNormal { loc, scale, low, high } => sd::Normal::new(loc, scale)
                .map(|d| d.ln_pdf(x) - (d.cdf(high) - d.cdf(low)).ln())
                .ok(),
        };
        res.unwrap_or(NAN)
    }

    /// Draw a single value.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<Real> {
        let family = self.family();
        let err = |e: &dyn std::fmt::Display| EmuError::invalid_prior(family, e);
        let x = match *self {
            Prior::Normal { loc, scale } => rand_distr::Normal::new(loc, scale)
                .map_err(|e| err(&e))?
                .sample(rng),
            Prior::HalfNormal { scale } => rand_distr::Normal::new(0.0, scale)
                .map_err(|e| err(&e))?
                .sample(rng)
                .abs(),
            Prior::LogNormal { loc, scale } => rand_distr::LogNormal::new(loc, scale)
                .map_err(|e| err(&e))?
                .sample(rng),
            Prior::Uniform { low, high } => {
                if !(low < high) {
                    return Err(err(&"low must be smaller than high"));
                }
                rng.gen_range(low..high)
            }
            Prior::Gamma { concentration, rate } => rand_distr::Gamma::new(concentration, 1.0 / rate)
                .map_err(|e| err(&e))?
                .sample(rng),
            Prior::Beta { concentration1, concentration0 } => {
                rand_distr::Beta::new(concentration1, concentration0)
                    .map_err(|e| err(&e))?
                    .sample(rng)
            }
            Prior::TruncatedNormal { loc, scale, low, high } => {
                let normal = sd::Normal::new(loc, scale).map_err(|e| err(&e))?;
                let (a, b) = (normal.cdf(low), normal.cdf(high));
                let u: Real = rng.gen_range(0.0..1.0);
                normal.inverse_cdf(a + u * (b - a)).max(low).min(high)
            }
        };
        Ok(x)
    }

    /// Mean of the distribution, when finite.
    pub fn mean(&self) -> Real {
        match *self {
            Prior::Normal { loc, .. } => loc,
            Prior::HalfNormal { scale } => scale * (2.0 / std::f64::consts::PI).sqrt(),
            Prior::LogNormal { loc, scale } => (loc + 0.5 * scale * scale).exp(),
            Prior::Uniform { low, high } => 0.5 * (low + high),
            Prior::Gamma { concentration, rate } => concentration / rate,
            Prior::Beta { concentration1, concentration0 } => {
                concentration1 / (concentration1 + concentration0)
            }
            Prior::TruncatedNormal { loc, scale, low, high } => sd::Normal::new(0.0, 1.0)
                .map(|z| {
                    let (a, b) = ((low - loc) / scale, (high - loc) / scale);
                    loc + scale * (z.pdf(a) - z.pdf(b)) / (z.cdf(b) - z.cdf(a))
                })
                .unwrap_or(NAN),
        }
    }
}

impl TryFrom<PriorSpec> for Prior {
    type Error = EmuError;

    fn try_from(spec: PriorSpec) -> Result<Self> {
        Prior::from_spec(&spec)
    }
}

impl From<Prior> for PriorSpec {
    fn from(prior: Prior) -> Self {
        prior.to_spec()
    }
}
