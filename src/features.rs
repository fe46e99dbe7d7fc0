use crate::error::PredictError;
use crate::types::ModelFeatures;

// Column names the encoding bundle may list in `feature_order`.
pub const FROM: &str = "From";
pub const TO: &str = "To";
pub const DEP_HOUR: &str = "dep_hour";
pub const DEP_WEEKDAY: &str = "dep_weekday";

impl ModelFeatures {
    pub fn value(&self, name: &str) -> Option<f64> {
        match name {
            FROM => Some(self.from as f64),
            TO => Some(self.to as f64),
            DEP_HOUR => Some(self.dep_hour as f64),
            DEP_WEEKDAY => Some(self.dep_weekday as f64),
            _ => None,
        }
    }
}

/// Single model input row, columns in `feature_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lay out `features` in the order the bundle declares. The order is read
/// at runtime; a name with no computed value makes the bundle unusable.
pub fn assemble(features: &ModelFeatures, feature_order: &[String]) -> Result<FeatureVector, PredictError> {
    let mut values = Vec::with_capacity(feature_order.len());
    for name in feature_order {
        let v = features
            .value(name)
            .ok_or_else(|| PredictError::MissingFeature(name.clone()))?;
        values.push(v);
    }
    Ok(FeatureVector {
        names: feature_order.to_vec(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const F: ModelFeatures = ModelFeatures {
        from: 2,
        to: 5,
        dep_hour: 8,
        dep_weekday: 4,
    };

    #[test]
    fn canonical_order() {
        let v = assemble(&F, &order(&["From", "To", "dep_hour", "dep_weekday"])).unwrap();
        assert_eq!(v.values(), &[2.0, 5.0, 8.0, 4.0]);
        assert_eq!(v.names()[0], "From");
    }

    #[test]
    fn follows_bundle_order() {
        let v = assemble(&F, &order(&["dep_weekday", "dep_hour", "To", "From"])).unwrap();
        assert_eq!(v.values(), &[4.0, 8.0, 5.0, 2.0]);

        let v = assemble(&F, &order(&["dep_hour", "From"])).unwrap();
        assert_eq!(v.values(), &[8.0, 2.0]);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let err = assemble(&F, &order(&["From", "To", "dep_month"])).unwrap_err();
        assert!(matches!(err, PredictError::MissingFeature(ref n) if n == "dep_month"));
    }

    #[test]
    fn column_names_are_case_sensitive() {
        assert!(assemble(&F, &order(&["from"])).is_err());
    }
}
