//! Hyperparameter grids over typed parameter structs.

use std::fmt;

use oxidize_select_core::{ConfigurationError, Hyperparameters, LearnResult, ParamValue};

/// Ordered value lists for the parameters of one algorithm.
///
/// Parameters without a value list keep the value of `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid<H: Hyperparameters> {
    base: H,
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl<H: Hyperparameters> Default for ParamGrid<H> {
    fn default() -> Self {
        ParamGrid::new(H::default())
    }
}

impl<H: Hyperparameters> ParamGrid<H> {
    pub fn new(base: H) -> Self {
        ParamGrid {
            base,
            axes: Vec::new(),
        }
    }

    pub fn base(&self) -> &H {
        &self.base
    }

    pub fn set_base(&mut self, base: H) {
        self.base = base;
    }

    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    /// Replace the value list of `name`, keeping its position if already set.
    pub fn set_param(
        &mut self,
        algorithm: &str,
        name: &str,
        values: Vec<ParamValue>,
    ) -> Result<(), ConfigurationError> {
        let spec = H::spec(name).ok_or_else(|| ConfigurationError::UnknownParameter {
            algorithm: algorithm.to_string(),
            name: name.to_string(),
        })?;
        if values.is_empty() {
            return Err(ConfigurationError::EmptyValueList {
                algorithm: algorithm.to_string(),
                name: name.to_string(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !spec.kind.accepts(v)) {
            return Err(ConfigurationError::ParameterKind {
                algorithm: algorithm.to_string(),
                name: name.to_string(),
                expected: spec.kind,
                got: bad.kind(),
            });
        }

        match self.axes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name.to_string(), values)),
        }
        Ok(())
    }

    /// Number of grid points: the product of the value list lengths.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily walk the cross product, last axis fastest.
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            axes: &self.axes,
            counters: vec![0; self.axes.len()],
            done: self.axes.iter().any(|(_, v)| v.is_empty()),
        }
    }

    /// Concrete parameters of one grid point.
    pub fn apply(&self, point: &GridPoint<'_>) -> LearnResult<H> {
        let mut params = self.base.clone();
        for (name, value) in &point.values {
            params.set(name, value)?;
        }
        Ok(params)
    }
}

/// One assignment of the grid's axes.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint<'a> {
    pub values: Vec<(&'a str, &'a ParamValue)>,
}

impl fmt::Display for GridPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Odometer over the axes of a `ParamGrid`.
pub struct GridIter<'a> {
    axes: &'a [(String, Vec<ParamValue>)],
    counters: Vec<usize>,
    done: bool,
}

impl<'a> Iterator for GridIter<'a> {
    type Item = GridPoint<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let point = GridPoint {
            values: self
                .axes
                .iter()
                .zip(&self.counters)
                .map(|((name, values), &i)| (name.as_str(), &values[i]))
                .collect(),
        };

        // Advance, carrying into earlier axes
        self.done = true;
        for axis in (0..self.axes.len()).rev() {
            self.counters[axis] += 1;
            if self.counters[axis] < self.axes[axis].1.len() {
                self.done = false;
                break;
            }
            self.counters[axis] = 0;
        }
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidize_select_core::ParamKind;
    use oxidize_select_tree::DecisionTreeParams;

    fn grid() -> ParamGrid<DecisionTreeParams> {
        ParamGrid::default()
    }

    #[test]
    fn test_empty_grid_has_one_point() {
        let g = grid();
        assert_eq!(g.len(), 1);
        let points: Vec<_> = g.iter().collect();
        assert_eq!(points.len(), 1);
        assert_eq!(g.apply(&points[0]).unwrap(), DecisionTreeParams::default());
    }

    #[test]
    fn test_cardinality_is_product() {
        let mut g = grid();
        let depths = vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Int(6)];
        g.set_param("DecisionTree", "max_depth", depths).unwrap();
        g.set_param("DecisionTree", "min_info_gain", vec![0.0.into(), 0.1.into()])
            .unwrap();
        g.set_param("DecisionTree", "impurity", vec!["gini".into(), "entropy".into()])
            .unwrap();
        assert_eq!(g.len(), 12);
        assert_eq!(g.iter().count(), 12);
    }

    #[test]
    fn test_last_axis_fastest() {
        let mut g = grid();
        g.set_param("DecisionTree", "max_depth", vec![1i64.into(), 2i64.into()])
            .unwrap();
        g.set_param(
            "DecisionTree",
            "min_instances_per_node",
            vec![3i64.into(), 4i64.into()],
        )
        .unwrap();
        let order: Vec<String> = g.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "max_depth=1, min_instances_per_node=3",
                "max_depth=1, min_instances_per_node=4",
                "max_depth=2, min_instances_per_node=3",
                "max_depth=2, min_instances_per_node=4",
            ]
        );
    }

    #[test]
    fn test_set_param_replaces_in_place() {
        let mut g = grid();
        g.set_param("DecisionTree", "max_depth", vec![ParamValue::Int(1)])
            .unwrap();
        g.set_param("DecisionTree", "impurity", vec!["gini".into()])
            .unwrap();
        g.set_param("DecisionTree", "max_depth", vec![7i64.into(), 8i64.into()])
            .unwrap();
        assert_eq!(g.axes()[0].0, "max_depth");
        assert_eq!(g.axes()[0].1.len(), 2);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_set_param_rejects_bad_input() {
        let mut g = grid();
        assert!(matches!(
            g.set_param("DecisionTree", "num_trees", vec![ParamValue::Int(1)]),
            Err(ConfigurationError::UnknownParameter { .. })
        ));
        assert_eq!(
            g.set_param("DecisionTree", "max_depth", vec![1.5.into()]),
            Err(ConfigurationError::ParameterKind {
                algorithm: "DecisionTree".into(),
                name: "max_depth".into(),
                expected: ParamKind::Int,
                got: ParamKind::Float,
            })
        );
        assert!(matches!(
            g.set_param("DecisionTree", "max_depth", vec![]),
            Err(ConfigurationError::EmptyValueList { .. })
        ));
    }

    #[test]
    fn test_apply_surfaces_domain_errors() {
        let mut g = grid();
        g.set_param("DecisionTree", "impurity", vec!["variance".into()])
            .unwrap();
        let point = g.iter().next().unwrap();
        assert!(g.apply(&point).is_err());
    }
}
