use serde::{Deserialize, Serialize};

/// A physical quantity that the engine samples over space. In the namelist
/// this is either a bare number, one of the predefined shapes, or a reference
/// to a user-defined function.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum SpaceProfile {
    /// Raw numeric literal, as written in the namelist. Canonicalized to a
    /// constant shape during the control phase; must not survive it.
    Scalar(f64),

    /// One of the predefined shapes, evaluated natively by the engine
    Shape(SpaceShape),

    /// User-defined expression, evaluated by the resident interpreter
    Function(FunctionProfile),
}

/// Same as [`SpaceProfile`] but sampled over simulation time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum TimeProfile {
    Scalar(f64),
    Shape(TimeShape),
    Function(FunctionProfile),
}

/// The predefined space shapes. Every variant carries its own name tag, so
/// the engine can evaluate it without calling back into the interpreter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SpaceShape {
    /// `value` everywhere
    Constant {
        #[serde(default = "one")]
        value: f64,
    },

    /// Zero before `xvacuum`, linear ramp over `xslope1`, plateau, linear
    /// ramp down over `xslope2`. A missing `xplateau` extends to the end of
    /// the box.
    Trapezoidal {
        #[serde(default = "one")]
        max: f64,
        #[serde(default)]
        xvacuum: f64,
        xplateau: Option<f64>,
        #[serde(default)]
        xslope1: f64,
        #[serde(default)]
        xslope2: f64,
    },

    /// (Super-)gaussian of order `xorder` inside `[xvacuum, xvacuum+xlength]`
    Gaussian {
        #[serde(default = "one")]
        max: f64,
        #[serde(default)]
        xvacuum: f64,
        xlength: f64,
        /// Defaults to `xlength / 3`
        xfwhm: Option<f64>,
        /// Defaults to the middle of the window
        xcenter: Option<f64>,
        #[serde(default = "two")]
        xorder: i32,
    },

    /// Piecewise-linear interpolation through `(xpoints, xvalues)`, zero
    /// outside the first and last point
    Polygonal { xpoints: Vec<f64>, xvalues: Vec<f64> },

    /// `base + amplitude * cos(xphi + 2π xnumber (x - xvacuum) / xlength)`
    /// inside the window, zero outside
    Cosine {
        base: f64,
        #[serde(default = "one")]
        amplitude: f64,
        #[serde(default)]
        xvacuum: f64,
        xlength: f64,
        #[serde(default)]
        xphi: f64,
        #[serde(default = "one")]
        xnumber: f64,
    },
}

/// The predefined time shapes. The constant shape deliberately has no
/// amplitude: a numeric literal on a time-varying field only means "on", and
/// normalization discards the value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TimeShape {
    /// 1 from `start` on, 0 before
    Constant {
        #[serde(default)]
        start: f64,
    },

    Trapezoidal {
        #[serde(default = "one")]
        max: f64,
        #[serde(default)]
        start: f64,
        /// Defaults to the rest of the run
        plateau: Option<f64>,
        #[serde(default)]
        slope1: f64,
        #[serde(default)]
        slope2: f64,
    },

    Gaussian {
        #[serde(default = "one")]
        max: f64,
        #[serde(default)]
        start: f64,
        duration: f64,
        fwhm: Option<f64>,
        center: Option<f64>,
        #[serde(default = "two")]
        order: i32,
    },

    Polygonal { points: Vec<f64>, values: Vec<f64> },

    Cosine {
        #[serde(default)]
        base: f64,
        #[serde(default = "one")]
        amplitude: f64,
        #[serde(default)]
        start: f64,
        duration: f64,
        #[serde(default)]
        phi: f64,
        #[serde(default = "one")]
        freq: f64,
    },

    /// sin² ramp over `slope1`, plateau, sin² ramp down over `slope2`.
    /// The usual laser envelope.
    Sin2Plateau {
        #[serde(default = "one")]
        max: f64,
        #[serde(default)]
        start: f64,
        #[serde(default)]
        slope1: f64,
        #[serde(default)]
        plateau: f64,
        #[serde(default)]
        slope2: f64,
    },
}

/// A reference to an entry of the namelist's `[functions]` table. These are
/// opaque to this crate: the engine's interpreter evaluates them during the
/// run, which is why their presence can force the interpreter to stay
/// resident.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionProfile {
    /// Name of the expression in `[functions]`
    pub function: String,

    /// Set when the expression is known to reduce to one of the predefined
    /// shapes, in which case the engine tabulates it once and never calls the
    /// interpreter again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined: Option<String>,
}

fn one() -> f64 {
    1.0
}

fn two() -> i32 {
    2
}

impl SpaceProfile {
    /// Canonical form: a bare number becomes a constant shape, anything that
    /// is already a profile passes through untouched.
    pub fn normalized(self) -> Self {
        match self {
            SpaceProfile::Scalar(value) => SpaceProfile::Shape(SpaceShape::Constant { value }),
            other => other,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, SpaceProfile::Scalar(_))
    }

    /// True when evaluating this profile requires the resident interpreter
    pub fn needs_interpreter(&self) -> bool {
        matches!(
            self,
            SpaceProfile::Function(FunctionProfile {
                predefined: None,
                ..
            })
        )
    }

    /// Evaluate at position `x`. `None` for user functions, which this crate
    /// cannot evaluate.
    pub fn at(&self, x: f64) -> Option<f64> {
        match self {
            SpaceProfile::Scalar(v) => Some(*v),
            SpaceProfile::Shape(shape) => Some(shape.at(x)),
            SpaceProfile::Function(_) => None,
        }
    }
}

impl TimeProfile {
    /// Canonical form: a bare number becomes the unit time shape. The value
    /// itself is discarded; amplitudes live on the space side.
    pub fn normalized(self) -> Self {
        match self {
            TimeProfile::Scalar(_) => TimeProfile::Shape(TimeShape::Constant { start: 0.0 }),
            other => other,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TimeProfile::Scalar(_))
    }

    pub fn needs_interpreter(&self) -> bool {
        matches!(
            self,
            TimeProfile::Function(FunctionProfile {
                predefined: None,
                ..
            })
        )
    }

    pub fn at(&self, t: f64) -> Option<f64> {
        match self {
            TimeProfile::Scalar(v) => Some(*v),
            TimeProfile::Shape(shape) => Some(shape.at(t)),
            TimeProfile::Function(_) => None,
        }
    }
}

impl SpaceShape {
    pub fn at(&self, x: f64) -> f64 {
        match *self {
            SpaceShape::Constant { value } => value,

            SpaceShape::Trapezoidal {
                max,
                xvacuum,
                xplateau,
                xslope1,
                xslope2,
            } => {
                let plateau = xplateau.unwrap_or(f64::INFINITY);
                ramp(x - xvacuum, max, xslope1, plateau, xslope2)
            }

            SpaceShape::Gaussian {
                max,
                xvacuum,
                xlength,
                xfwhm,
                xcenter,
                xorder,
            } => {
                if x < xvacuum || x > xvacuum + xlength {
                    return 0.0;
                }
                let fwhm = xfwhm.unwrap_or(xlength / 3.0);
                let center = xcenter.unwrap_or(xvacuum + xlength / 2.0);
                // sigma chosen so the value drops to max/2 at fwhm/2
                let sigma = (0.5 * fwhm).powi(xorder) / 2f64.ln();
                max * (-(x - center).powi(xorder) / sigma).exp()
            }

            SpaceShape::Polygonal {
                ref xpoints,
                ref xvalues,
            } => interpolate(xpoints, xvalues, x),

            SpaceShape::Cosine {
                base,
                amplitude,
                xvacuum,
                xlength,
                xphi,
                xnumber,
            } => {
                if x < xvacuum || x > xvacuum + xlength {
                    return 0.0;
                }
                base + amplitude
                    * (xphi + 2.0 * std::f64::consts::PI * xnumber * (x - xvacuum) / xlength).cos()
            }
        }
    }
}

impl TimeShape {
    pub fn at(&self, t: f64) -> f64 {
        match *self {
            TimeShape::Constant { start } => {
                if t < start {
                    0.0
                } else {
                    1.0
                }
            }

            TimeShape::Trapezoidal {
                max,
                start,
                plateau,
                slope1,
                slope2,
            } => ramp(t - start, max, slope1, plateau.unwrap_or(f64::INFINITY), slope2),

            TimeShape::Gaussian {
                max,
                start,
                duration,
                fwhm,
                center,
                order,
            } => {
                if t < start || t > start + duration {
                    return 0.0;
                }
                let fwhm = fwhm.unwrap_or(duration / 3.0);
                let center = center.unwrap_or(start + duration / 2.0);
                let sigma = (0.5 * fwhm).powi(order) / 2f64.ln();
                max * (-(t - center).powi(order) / sigma).exp()
            }

            TimeShape::Polygonal {
                ref points,
                ref values,
            } => interpolate(points, values, t),

            TimeShape::Cosine {
                base,
                amplitude,
                start,
                duration,
                phi,
                freq,
            } => {
                if t < start || t > start + duration {
                    return 0.0;
                }
                base + amplitude
                    * (phi + 2.0 * std::f64::consts::PI * freq * (t - start) / duration).cos()
            }

            TimeShape::Sin2Plateau {
                max,
                start,
                slope1,
                plateau,
                slope2,
            } => {
                let t = t - start;
                if t < 0.0 || t > slope1 + plateau + slope2 {
                    0.0
                } else if t < slope1 {
                    max * (std::f64::consts::FRAC_PI_2 * t / slope1).sin().powi(2)
                } else if t < slope1 + plateau {
                    max
                } else {
                    max * (std::f64::consts::FRAC_PI_2 * (slope1 + plateau + slope2 - t) / slope2)
                        .sin()
                        .powi(2)
                }
            }
        }
    }
}

/// Zero before 0, linear rise over `up`, `max` on the plateau, linear fall
/// over `down`, zero after
fn ramp(u: f64, max: f64, up: f64, plateau: f64, down: f64) -> f64 {
    if u < 0.0 {
        0.0
    } else if u < up {
        max * u / up
    } else if u <= up + plateau {
        max
    } else if u < up + plateau + down {
        max * (up + plateau + down - u) / down
    } else {
        0.0
    }
}

/// Piecewise-linear interpolation, zero outside the node range. Nodes are
/// assumed sorted; mismatched lengths are clamped to the shorter list.
fn interpolate(points: &[f64], values: &[f64], u: f64) -> f64 {
    let n = points.len().min(values.len());
    if n == 0 || u < points[0] || u > points[n - 1] {
        return 0.0;
    }
    for i in 1..n {
        if u <= points[i] {
            let w = (u - points[i - 1]) / (points[i] - points[i - 1]);
            return values[i - 1] + w * (values[i] - values[i - 1]);
        }
    }
    values[n - 1]
}

#[test]
fn test_scalar_normalizes_to_constant() {
    let p = SpaceProfile::Scalar(3.5).normalized();
    assert_eq!(p, SpaceProfile::Shape(SpaceShape::Constant { value: 3.5 }));
    assert_eq!(p.at(0.0), Some(3.5));
    assert_eq!(p.at(1e9), Some(3.5));
}

#[test]
fn test_normalization_is_idempotent_on_profiles() {
    let shape = SpaceProfile::Shape(SpaceShape::Constant { value: 2.0 });
    assert_eq!(shape.clone().normalized(), shape);

    let func = SpaceProfile::Function(FunctionProfile {
        function: "my_density".to_string(),
        predefined: None,
    });
    assert_eq!(func.clone().normalized(), func);
}

#[test]
fn test_time_scalar_discards_value() {
    let p = TimeProfile::Scalar(42.0).normalized();
    assert_eq!(p, TimeProfile::Shape(TimeShape::Constant { start: 0.0 }));
    assert_eq!(p.at(5.0), Some(1.0));
    assert_eq!(p.at(-1.0), Some(0.0));
}

#[test]
fn test_trapezoidal_evaluation() {
    let shape = SpaceShape::Trapezoidal {
        max: 2.0,
        xvacuum: 1.0,
        xplateau: Some(4.0),
        xslope1: 2.0,
        xslope2: 2.0,
    };
    assert_eq!(shape.at(0.5), 0.0); // vacuum
    assert_eq!(shape.at(2.0), 1.0); // halfway up the ramp
    assert_eq!(shape.at(4.0), 2.0); // plateau
    assert_eq!(shape.at(8.0), 1.0); // halfway down
    assert_eq!(shape.at(9.5), 0.0); // past the end
}

#[test]
fn test_trapezoidal_open_plateau() {
    let shape = SpaceShape::Trapezoidal {
        max: 1.0,
        xvacuum: 0.0,
        xplateau: None,
        xslope1: 0.0,
        xslope2: 0.0,
    };
    assert_eq!(shape.at(1e6), 1.0);
}

#[test]
fn test_gaussian_evaluation() {
    let shape = SpaceShape::Gaussian {
        max: 3.0,
        xvacuum: 0.0,
        xlength: 10.0,
        xfwhm: Some(2.0),
        xcenter: Some(5.0),
        xorder: 2,
    };
    assert_eq!(shape.at(5.0), 3.0);
    // half maximum at center +- fwhm/2
    assert!((shape.at(6.0) - 1.5).abs() < 1e-12);
    assert_eq!(shape.at(11.0), 0.0);
}

#[test]
fn test_polygonal_interpolation() {
    let shape = SpaceShape::Polygonal {
        xpoints: vec![0.0, 1.0, 3.0],
        xvalues: vec![0.0, 2.0, 0.0],
    };
    assert_eq!(shape.at(-0.5), 0.0);
    assert_eq!(shape.at(0.5), 1.0);
    assert_eq!(shape.at(1.0), 2.0);
    assert_eq!(shape.at(2.0), 1.0);
    assert_eq!(shape.at(4.0), 0.0);
}

#[test]
fn test_sin2_plateau_envelope() {
    let env = TimeShape::Sin2Plateau {
        max: 1.0,
        start: 0.0,
        slope1: 2.0,
        plateau: 4.0,
        slope2: 2.0,
    };
    assert_eq!(env.at(-1.0), 0.0);
    assert!((env.at(1.0) - 0.5).abs() < 1e-12);
    assert_eq!(env.at(3.0), 1.0);
    assert!((env.at(7.0) - 0.5).abs() < 1e-12);
    assert_eq!(env.at(9.0), 0.0);
}

#[test]
fn test_untagged_deserialization() {
    let scalar: SpaceProfile = toml::from_str::<std::collections::BTreeMap<String, SpaceProfile>>(
        "p = 10.0",
    )
    .unwrap()
    .remove("p")
    .unwrap();
    assert_eq!(scalar, SpaceProfile::Scalar(10.0));

    let shape: SpaceProfile = toml::from_str::<std::collections::BTreeMap<String, SpaceProfile>>(
        "p = { shape = \"trapezoidal\", max = 1.0, xplateau = 5.0 }",
    )
    .unwrap()
    .remove("p")
    .unwrap();
    assert!(matches!(
        shape,
        SpaceProfile::Shape(SpaceShape::Trapezoidal { .. })
    ));

    let func: SpaceProfile = toml::from_str::<std::collections::BTreeMap<String, SpaceProfile>>(
        "p = { function = \"ramp_density\" }",
    )
    .unwrap()
    .remove("p")
    .unwrap();
    assert!(func.needs_interpreter());
}

#[test]
fn test_predefined_marker_suppresses_interpreter() {
    let func = TimeProfile::Function(FunctionProfile {
        function: "envelope".to_string(),
        predefined: Some("tgaussian".to_string()),
    });
    assert!(!func.needs_interpreter());
}
