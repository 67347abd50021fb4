//! The flat settings record an experiment is configured with, and the
//! methods it can select.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
  EnKF,
  #[serde(rename = "EnKF_N")]
  EnKFN,
  #[serde(rename = "iEnKF")]
  IEnKF,
  PartFilt,
  ExtKF,
  #[serde(rename = "3DVar")]
  Var3D,
  Climatology,
  EnsCheat,
}

/// A settable field of `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
  N,
  Infl,
  Rot,
  AMethod,
  IMax,
  Tol,
  Ner,
  Resampling,
  Reg,
}

/// The update family of the ensemble Kalman filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AMethod {
  /// Perturbed observations.
  PertObs,
  /// Symmetric square root (ETKF).
  Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resampling {
  Systematic,
  Multinomial,
  Residual,
}

impl Default for Resampling {
  fn default() -> Resampling { Resampling::Systematic }
}

impl Method {
  pub const ALL: [Method; 8] = [
    Method::EnKF,
    Method::EnKFN,
    Method::IEnKF,
    Method::PartFilt,
    Method::ExtKF,
    Method::Var3D,
    Method::Climatology,
    Method::EnsCheat,
  ];

  pub fn name(&self) -> &'static str {
    match *self {
      Method::EnKF => "EnKF",
      Method::EnKFN => "EnKF_N",
      Method::IEnKF => "iEnKF",
      Method::PartFilt => "PartFilt",
      Method::ExtKF => "ExtKF",
      Method::Var3D => "3DVar",
      Method::Climatology => "Climatology",
      Method::EnsCheat => "EnsCheat",
    }
  }

  /// Every field the method reads, required or not.
  pub fn reads(&self) -> &'static [Field] {
    use self::Field::*;
    match *self {
      Method::EnKF => &[N, AMethod, Infl, Rot],
      Method::EnKFN => &[N, Infl, Rot],
      Method::IEnKF => &[N, IMax, Infl, Rot, Tol],
      Method::PartFilt => &[N, Ner, Resampling, Reg],
      Method::ExtKF => &[Infl],
      Method::Var3D => &[Infl],
      Method::Climatology => &[],
      Method::EnsCheat => &[N],
    }
  }

  /// The fields without a default.
  pub fn requires(&self) -> &'static [Field] {
    use self::Field::*;
    match *self {
      Method::EnKF => &[N, AMethod],
      Method::EnKFN => &[N],
      Method::IEnKF => &[N, IMax],
      Method::PartFilt => &[N, Ner],
      Method::EnsCheat => &[N],
      Method::ExtKF | Method::Var3D | Method::Climatology => &[],
    }
  }

  pub fn is_ensemble(&self) -> bool {
    match *self {
      Method::EnKF | Method::EnKFN | Method::IEnKF |
      Method::PartFilt | Method::EnsCheat => true,
      Method::ExtKF | Method::Var3D | Method::Climatology => false,
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Method {
  type Err = Error;
  fn from_str(s: &str) -> Result<Method> {
    let lower = s.trim().to_ascii_lowercase();
    let m = match &lower[..] {
      "enkf" => Method::EnKF,
      "enkf_n" => Method::EnKFN,
      "ienkf" => Method::IEnKF,
      "partfilt" => Method::PartFilt,
      "extkf" => Method::ExtKF,
      "3dvar" | "d3var" => Method::Var3D,
      "climatology" => Method::Climatology,
      "enscheat" => Method::EnsCheat,
      _ => return Err(Error::UnknownMethod(s.to_string())),
    };
    Ok(m)
  }
}

impl Field {
  pub fn name(&self) -> &'static str {
    match *self {
      Field::N => "N",
      Field::Infl => "infl",
      Field::Rot => "rot",
      Field::AMethod => "upd_a",
      Field::IMax => "iMax",
      Field::Tol => "tol",
      Field::Ner => "NER",
      Field::Resampling => "resampl",
      Field::Reg => "reg",
    }
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for AMethod {
  type Err = String;
  fn from_str(s: &str) -> ::std::result::Result<AMethod, String> {
    match &s.trim().to_ascii_lowercase()[..] {
      "pertobs" => Ok(AMethod::PertObs),
      "sqrt" => Ok(AMethod::Sqrt),
      _ => Err(format!("unknown analysis update `{}`", s)),
    }
  }
}

impl FromStr for Resampling {
  type Err = String;
  fn from_str(s: &str) -> ::std::result::Result<Resampling, String> {
    match &s.trim().to_ascii_lowercase()[..] {
      "systematic" | "sys" => Ok(Resampling::Systematic),
      "multinomial" => Ok(Resampling::Multinomial),
      "residual" => Ok(Resampling::Residual),
      _ => Err(format!("unknown resampling scheme `{}`", s)),
    }
  }
}

/// Settings of one experiment. Unset fields fall back to the method's
/// defaults; fields the method does not read are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub da_method: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub n: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub infl: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rot: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub a_method: Option<AMethod>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub i_max: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tol: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ner: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resampling: Option<Resampling>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reg: Option<f64>,
}

impl Config {
  pub fn new(da_method: &str) -> Config {
    Config {
      da_method: da_method.to_string(),
      ..Default::default()
    }
  }

  pub fn n(mut self, n: usize) -> Config { self.n = Some(n); self }
  pub fn infl(mut self, infl: f64) -> Config { self.infl = Some(infl); self }
  pub fn rot(mut self, rot: bool) -> Config { self.rot = Some(rot); self }
  pub fn a_method(mut self, a: AMethod) -> Config { self.a_method = Some(a); self }
  pub fn i_max(mut self, i_max: usize) -> Config { self.i_max = Some(i_max); self }
  pub fn tol(mut self, tol: f64) -> Config { self.tol = Some(tol); self }
  pub fn ner(mut self, ner: f64) -> Config { self.ner = Some(ner); self }
  pub fn resampling(mut self, r: Resampling) -> Config {
    self.resampling = Some(r);
    self
  }
  pub fn reg(mut self, reg: f64) -> Config { self.reg = Some(reg); self }

  pub fn method(&self) -> Result<Method> { self.da_method.parse() }

  pub fn is_set(&self, field: Field) -> bool {
    match field {
      Field::N => self.n.is_some(),
      Field::Infl => self.infl.is_some(),
      Field::Rot => self.rot.is_some(),
      Field::AMethod => self.a_method.is_some(),
      Field::IMax => self.i_max.is_some(),
      Field::Tol => self.tol.is_some(),
      Field::Ner => self.ner.is_some(),
      Field::Resampling => self.resampling.is_some(),
      Field::Reg => self.reg.is_some(),
    }
  }

  /// Set fields that `method` does not read.
  pub fn ignored_by(&self, method: Method) -> Vec<Field> {
    const ALL: [Field; 9] = [Field::N, Field::Infl, Field::Rot,
                             Field::AMethod, Field::IMax, Field::Tol,
                             Field::Ner, Field::Resampling, Field::Reg];
    ALL.iter()
      .cloned()
      .filter(|&f| self.is_set(f) && !method.reads().contains(&f))
      .collect()
  }

  /// Checks that every required field of `method` is set.
  pub fn check_required(&self, method: Method) -> Result<()> {
    match method.requires().iter().find(|&&f| !self.is_set(f)) {
      Some(&field) => Err(Error::MissingParameter { method, field }),
      None => Ok(()),
    }
  }
}
