//! ToParams trait for struct-to-parameters mapping.
//!
//! ```rust,ignore
//! use mssql_client::{NamedParam, ToParams};
//! use mssql_types::TypeError;
//!
//! struct NewUser {
//!     name: String,
//!     email: String,
//! }
//!
//! impl ToParams for NewUser {
//!     fn to_params(&self) -> Result<Vec<NamedParam>, TypeError> {
//!         Ok(vec![
//!             NamedParam::from_value("name", &self.name)?,
//!             NamedParam::from_value("email", &self.email)?,
//!         ])
//!     }
//! }
//!
//! client.call_named("dbo.CreateUser", &user).await?;
//! ```

use mssql_types::{CellValue, ToSql, TypeError};

use crate::rpc::Parameter;

/// A named input parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    /// Parameter name (the @ prefix is optional).
    pub name: String,
    /// Parameter value.
    pub value: CellValue,
}

impl NamedParam {
    /// Create a new named parameter.
    pub fn new<S: Into<String>>(name: S, value: CellValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Create a named parameter from a value implementing ToSql.
    pub fn from_value<S: Into<String>, T: ToSql + ?Sized>(
        name: S,
        value: &T,
    ) -> Result<Self, TypeError> {
        Ok(Self {
            name: name.into(),
            value: value.to_sql()?,
        })
    }
}

impl From<NamedParam> for Parameter {
    fn from(param: NamedParam) -> Self {
        Parameter::input(param.name, param.value)
    }
}

/// Trait for types that can be converted to named parameters.
pub trait ToParams {
    /// Convert this struct to a vector of named parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any field value cannot be converted.
    fn to_params(&self) -> Result<Vec<NamedParam>, TypeError>;

    /// Get the number of parameters this struct produces.
    ///
    /// Returns `None` if the count is dynamic.
    fn param_count(&self) -> Option<usize> {
        None
    }
}

/// A list of named parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamList {
    params: Vec<NamedParam>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter to the list.
    pub fn push(&mut self, param: NamedParam) {
        self.params.push(param);
    }

    /// Add a parameter by name and value.
    pub fn add<S: Into<String>, T: ToSql + ?Sized>(
        &mut self,
        name: S,
        value: &T,
    ) -> Result<(), TypeError> {
        self.params.push(NamedParam::from_value(name, value)?);
        Ok(())
    }

    /// Get the parameters as a slice.
    pub fn as_slice(&self) -> &[NamedParam] {
        &self.params
    }

    /// Get the number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = &NamedParam> {
        self.params.iter()
    }
}

impl ToParams for ParamList {
    fn to_params(&self) -> Result<Vec<NamedParam>, TypeError> {
        Ok(self.params.clone())
    }

    fn param_count(&self) -> Option<usize> {
        Some(self.params.len())
    }
}

impl From<Vec<NamedParam>> for ParamList {
    fn from(params: Vec<NamedParam>) -> Self {
        Self { params }
    }
}

impl IntoIterator for ParamList {
    type Item = NamedParam;
    type IntoIter = std::vec::IntoIter<NamedParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}

impl FromIterator<NamedParam> for ParamList {
    fn from_iter<I: IntoIterator<Item = NamedParam>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rpc::ParamDirection;

    struct TestParams {
        name: String,
        age: i32,
    }

    impl ToParams for TestParams {
        fn to_params(&self) -> Result<Vec<NamedParam>, TypeError> {
            Ok(vec![
                NamedParam::from_value("name", &self.name)?,
                NamedParam::from_value("age", &self.age)?,
            ])
        }

        fn param_count(&self) -> Option<usize> {
            Some(2)
        }
    }

    #[test]
    fn test_to_params_manual_impl() {
        let params = TestParams {
            name: "Alice".to_string(),
            age: 30,
        };

        let named_params = params.to_params().unwrap();
        assert_eq!(named_params.len(), 2);
        assert_eq!(named_params[0].name, "name");
        assert_eq!(named_params[1].value, CellValue::Int32(30));
    }

    #[test]
    fn test_named_param_becomes_input() {
        let param: Parameter = NamedParam::from_value("@x", &7i64).unwrap().into();
        assert_eq!(param.direction, ParamDirection::Input);
        assert_eq!(param.wire_name(), "@x");
        assert_eq!(param.value, CellValue::Int64(7));
    }

    #[test]
    fn test_param_list() {
        let mut list = ParamList::new();
        list.add("name", "Alice").unwrap();
        list.add("age", &30i32).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.param_count(), Some(2));
        let names: Vec<&str> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age"]);
    }
}
