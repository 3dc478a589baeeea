use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use num_traits::Float;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Error, Result};

/// Table shipped with the crate, used when no table file is given.
const BUNDLED_TABLE: &str = include_str!("../data/parameters.toml");

/// Identifier of a blood-chemistry parameter, such as `BHB` or `GLU`
///
/// Names are trimmed and upper-cased on construction so lookups are case-insensitive.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Analyte(String);

impl Analyte {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Analyte {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Analyte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Linear hemolysis interference model for a single parameter
///
/// The percent bias introduced by a free hemoglobin concentration $H$ is
///
/// $$
///     p(H) = a H + b
/// $$
///
/// and `r_squared` is the coefficient of determination of the regression which produced
/// $a$ and $b$. It controls the width of the confidence interval on $p$.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterProfile<E> {
    name: Analyte,
    a: E,
    b: E,
    r_squared: E,
}

impl<E: Float> ParameterProfile<E> {
    /// Build a validated profile
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameterConfig`] if the name is empty, a coefficient is not
    /// finite or `r_squared` lies outside `[0, 1]`.
    pub fn new(name: &str, a: E, b: E, r_squared: E) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameterConfig {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };

        let name = Analyte::new(name);
        if name.as_str().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !a.is_finite() || !b.is_finite() {
            return Err(invalid("regression coefficients must be finite"));
        }
        // A NaN fails both comparisons, so it is rejected here as well
        if !(r_squared >= E::zero() && r_squared <= E::one()) {
            return Err(invalid("r2 must lie in [0, 1]"));
        }

        Ok(Self {
            name,
            a,
            b,
            r_squared,
        })
    }

    pub const fn name(&self) -> &Analyte {
        &self.name
    }

    /// Slope of the bias in percent per unit Hb
    pub const fn a(&self) -> E {
        self.a
    }

    /// Bias in percent at zero Hb
    pub const fn b(&self) -> E {
        self.b
    }

    pub const fn r_squared(&self) -> E {
        self.r_squared
    }
}

/// On-disk representation of a profile
#[derive(Deserialize, Serialize)]
struct Row<E> {
    name: String,
    a: E,
    b: E,
    r2: E,
}

#[derive(Deserialize, Serialize)]
struct TableFile<E> {
    #[serde(default = "Vec::new")]
    parameter: Vec<Row<E>>,
}

/// Read-only lookup from [`Analyte`] to its [`ParameterProfile`]
///
/// The table is validated in full when it is built and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterTable<E> {
    profiles: BTreeMap<Analyte, ParameterProfile<E>>,
}

impl<E: Float> ParameterTable<E> {
    /// Build a table, rejecting duplicate names
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameterConfig`] if two profiles share a name.
    pub fn new(profiles: impl IntoIterator<Item = ParameterProfile<E>>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for profile in profiles {
            let name = profile.name().clone();
            if map.insert(name.clone(), profile).is_some() {
                return Err(Error::InvalidParameterConfig {
                    name: name.0,
                    reason: "parameter is defined more than once".to_owned(),
                });
            }
        }
        Ok(Self { profiles: map })
    }

    /// Look up the profile for `name`, ignoring case
    ///
    /// # Errors
    /// Returns [`Error::UnknownParameter`] if the table has no entry for `name`.
    pub fn get(&self, name: &str) -> Result<&ParameterProfile<E>> {
        self.profiles
            .get(&Analyte::new(name))
            .ok_or_else(|| Error::UnknownParameter(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterProfile<E>> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl<E: Float + DeserializeOwned> ParameterTable<E> {
    /// Parse a table from its TOML representation
    ///
    /// ```
    /// use hemobias::ParameterTable;
    ///
    /// let table: ParameterTable<f64> = ParameterTable::from_toml_str(
    ///     r#"
    ///     [[parameter]]
    ///     name = "glu"
    ///     a = -0.42
    ///     b = 0.1
    ///     r2 = 0.87
    ///     "#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(table.get("GLU").unwrap().a(), -0.42);
    /// ```
    ///
    /// # Errors
    /// Returns an error if the document is not valid TOML or any entry fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: TableFile<E> = toml::from_str(source)?;
        let profiles = file
            .parameter
            .into_iter()
            .map(|row| ParameterProfile::new(&row.name, row.a, row.b, row.r2))
            .collect::<Result<Vec<_>>>()?;
        Self::new(profiles)
    }

    /// Load a table from a TOML file on disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        let table = Self::from_toml_str(&source)?;
        tracing::info!(path = %path.display(), parameters = table.len(), "loaded parameter table");
        Ok(table)
    }

    /// The table compiled into the crate
    ///
    /// # Errors
    /// Only fails if the bundled data is malformed.
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_TABLE)
    }
}

impl<E: Float + Serialize> ParameterTable<E> {
    /// Render the table in the format accepted by [`ParameterTable::from_toml_str`]
    ///
    /// # Errors
    /// Returns an error if serialisation fails.
    pub fn to_toml_string(&self) -> Result<String> {
        let file = TableFile {
            parameter: self
                .iter()
                .map(|profile| Row {
                    name: profile.name().to_string(),
                    a: profile.a(),
                    b: profile.b(),
                    r2: profile.r_squared(),
                })
                .collect(),
        };
        Ok(toml::to_string(&file)?)
    }
}

#[cfg(test)]
mod test {
    use super::{Analyte, ParameterProfile, ParameterTable};
    use crate::{Error, Result};

    #[test]
    fn bundled_table_contains_beta_hydroxybutyrate() -> Result<()> {
        let table: ParameterTable<f64> = ParameterTable::bundled()?;
        let bhb = table.get("bhb")?;

        assert_eq!(bhb.name(), &Analyte::new("BHB"));
        approx::assert_relative_eq!(bhb.a(), 5.3201);
        approx::assert_relative_eq!(bhb.b(), 0.957);
        approx::assert_relative_eq!(bhb.r_squared(), 0.9913);
        Ok(())
    }

    #[test]
    fn r_squared_above_one_is_rejected() {
        let profile = ParameterProfile::new("GLU", 1.0, 0.0, 1.2);
        assert!(matches!(
            profile,
            Err(Error::InvalidParameterConfig { ref name, .. }) if name == "GLU"
        ));
    }

    #[test]
    fn negative_or_nan_r_squared_is_rejected() {
        assert!(ParameterProfile::new("GLU", 1.0, 0.0, -0.1).is_err());
        assert!(ParameterProfile::new("GLU", 1.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn non_finite_coefficients_are_rejected() {
        assert!(ParameterProfile::new("GLU", f64::INFINITY, 0.0, 0.5).is_err());
        assert!(ParameterProfile::new("GLU", 1.0, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(ParameterProfile::new("  ", 1.0, 0.0, 0.5).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected_regardless_of_case() -> Result<()> {
        let profiles = vec![
            ParameterProfile::new("ALT", 1.0, 0.0, 0.5)?,
            ParameterProfile::new("alt", 2.0, 0.0, 0.5)?,
        ];
        assert!(matches!(
            ParameterTable::new(profiles),
            Err(Error::InvalidParameterConfig { .. })
        ));
        Ok(())
    }

    #[test]
    fn invalid_entries_in_toml_fail_the_whole_table() {
        let source = r#"
            [[parameter]]
            name = "BHB"
            a = 5.3201
            b = 0.957
            r2 = 0.9913

            [[parameter]]
            name = "K"
            a = 1.0
            b = 0.0
            r2 = 1.2
        "#;
        let table: crate::Result<ParameterTable<f64>> = ParameterTable::from_toml_str(source);
        assert!(matches!(
            table,
            Err(Error::InvalidParameterConfig { ref name, .. }) if name == "K"
        ));
    }

    #[test]
    fn unknown_parameters_are_reported_by_name() -> Result<()> {
        let table: ParameterTable<f64> = ParameterTable::bundled()?;
        assert!(matches!(
            table.get("XYZ"),
            Err(Error::UnknownParameter(ref name)) if name == "XYZ"
        ));
        Ok(())
    }

    #[test]
    fn tables_survive_a_trip_through_toml() -> Result<()> {
        let table = ParameterTable::new(vec![
            ParameterProfile::new("ALP", -0.25, 1.5, 0.75)?,
            ParameterProfile::new("TP", 3.125, -0.5, 0.5)?,
        ])?;

        let restored: ParameterTable<f64> =
            ParameterTable::from_toml_str(&table.to_toml_string()?)?;

        assert_eq!(table, restored);
        Ok(())
    }
}
