//! Parameter setter dispatch
//!
//! Scene objects document each parameter with a type string such as
//! `"vec3f(a)"` or `"vec4f[] / vec3fa[]"`. [`ParamType::parse`] maps those
//! strings to the native setter to call and, for array parameters, the
//! element kinds a data object may carry.

use crate::handle::RawHandle;
use crate::types::TypeTag;
use crate::{Error, Result};

/// Native setter family for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setter {
    /// Object reference (camera, model, volume, texture)
    Object,
    /// Data array reference
    Data,
    /// One int (also used for bools)
    Int1,
    /// One float
    Float1,
    /// Two floats
    Float2,
    /// Three floats
    Float3,
    /// Four floats
    Float4,
    /// One, three or four floats, picked by argument count
    FloatVariadic,
    /// Documented type with no native setter (strings, int vectors)
    Unsupported,
}

impl Setter {
    /// Number of host arguments the setter takes, if fixed
    pub const fn arity(self) -> Option<usize> {
        match self {
            Setter::Object | Setter::Data | Setter::Int1 | Setter::Float1 => Some(1),
            Setter::Float2 => Some(2),
            Setter::Float3 => Some(3),
            Setter::Float4 => Some(4),
            Setter::FloatVariadic | Setter::Unsupported => None,
        }
    }

    /// Native function implementing a concrete setter
    pub const fn symbol(self) -> Option<&'static str> {
        match self {
            Setter::Object => Some("ospSetObject"),
            Setter::Data => Some("ospSetData"),
            Setter::Int1 => Some("ospSet1i"),
            Setter::Float1 => Some("ospSet1f"),
            Setter::Float2 => Some("ospSet2f"),
            Setter::Float3 => Some("ospSet3f"),
            Setter::Float4 => Some("ospSet4f"),
            Setter::FloatVariadic | Setter::Unsupported => None,
        }
    }

    /// Pick the concrete setter for `n` host arguments
    pub fn for_arity(self, n: usize) -> Result<Setter> {
        match (self, n) {
            (Setter::FloatVariadic, 1) => Ok(Setter::Float1),
            (Setter::FloatVariadic, 3) => Ok(Setter::Float3),
            (Setter::FloatVariadic, 4) => Ok(Setter::Float4),
            (Setter::FloatVariadic, n) => Err(Error::UnsupportedParameter(format!(
                "float / vec3f / vec4f takes 1, 3 or 4 values, got {}",
                n
            ))),
            (Setter::Unsupported, _) => Err(Error::UnsupportedParameter(
                "parameter type has no native setter".to_string(),
            )),
            (setter, n) if setter.arity() == Some(n) => Ok(setter),
            (setter, n) => Err(Error::UnsupportedParameter(format!(
                "{:?} takes {} value(s), got {}",
                setter,
                setter.arity().unwrap_or(0),
                n
            ))),
        }
    }

    /// Convert host arguments into the value passed to the native setter
    pub fn bind(self, args: &[ParamArg]) -> Result<ParamValue> {
        let setter = self.for_arity(args.len())?;
        let value = match setter {
            Setter::Object => ParamValue::Object(args[0].as_handle()?),
            Setter::Data => ParamValue::Data(args[0].as_handle()?),
            Setter::Int1 => ParamValue::Int(args[0].as_int()?),
            Setter::Float1 => ParamValue::Float(args[0].as_float()?),
            Setter::Float2 => ParamValue::Float2(floats(args)?),
            Setter::Float3 => ParamValue::Float3(floats(args)?),
            Setter::Float4 => ParamValue::Float4(floats(args)?),
            Setter::FloatVariadic | Setter::Unsupported => unreachable!("resolved by for_arity"),
        };
        Ok(value)
    }
}

fn floats<const N: usize>(args: &[ParamArg]) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_float()?;
    }
    Ok(out)
}

/// One host-side argument of a parameter assignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamArg {
    /// Wrapped native object
    Handle(RawHandle),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Boolean
    Bool(bool),
}

impl ParamArg {
    fn as_handle(&self) -> Result<RawHandle> {
        match self {
            ParamArg::Handle(handle) => Ok(*handle),
            other => Err(Error::UnsupportedParameter(format!(
                "expected an object, got {:?}",
                other
            ))),
        }
    }

    fn as_int(&self) -> Result<i32> {
        match *self {
            ParamArg::Bool(b) => Ok(b as i32),
            ParamArg::Int(i) => i32::try_from(i)
                .map_err(|_| Error::UnsupportedParameter(format!("{} does not fit in int32", i))),
            other => Err(Error::UnsupportedParameter(format!(
                "expected an int, got {:?}",
                other
            ))),
        }
    }

    fn as_float(&self) -> Result<f32> {
        match *self {
            ParamArg::Float(f) => Ok(f as f32),
            ParamArg::Int(i) => Ok(i as f32),
            other => Err(Error::UnsupportedParameter(format!(
                "expected a number, got {:?}",
                other
            ))),
        }
    }
}

/// Typed value handed to the native setter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// `ospSetObject`
    Object(RawHandle),
    /// `ospSetData`
    Data(RawHandle),
    /// `ospSet1i`
    Int(i32),
    /// `ospSet1f`
    Float(f32),
    /// `ospSet2f`
    Float2([f32; 2]),
    /// `ospSet3f`
    Float3([f32; 3]),
    /// `ospSet4f`
    Float4([f32; 4]),
}

/// Parsed parameter type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamType {
    setter: Setter,
    accepts: Vec<TypeTag>,
}

impl ParamType {
    /// Parse a documented parameter type, e.g. `"vec3f(a)[]"`.
    pub fn parse(doc: &str) -> Result<Self> {
        let doc = doc.trim();
        let setter = match doc {
            "OSPCamera" | "OSPModel" | "OSPTexture2D" | "OSPVolume" => Setter::Object,
            "OSPData" => Setter::Data,
            "bool" | "int" => Setter::Int1,
            "float" => Setter::Float1,
            "float / vec3f / vec4f" => Setter::FloatVariadic,
            "vec2f" => Setter::Float2,
            "vec3f" | "vec3f(a)" => Setter::Float3,
            "string" | "vec3i" => Setter::Unsupported,
            array if array.ends_with("[]") => {
                let accepts = array_element_tags(array)?;
                return Ok(Self {
                    setter: Setter::Data,
                    accepts,
                });
            }
            other => {
                return Err(Error::UnsupportedParameter(format!(
                    "unknown parameter type {:?}",
                    other
                )))
            }
        };
        Ok(Self {
            setter,
            accepts: Vec::new(),
        })
    }

    /// Setter family
    pub fn setter(&self) -> Setter {
        self.setter
    }

    /// Element kinds allowed in a data parameter; empty means unrestricted
    pub fn accepts(&self) -> &[TypeTag] {
        &self.accepts
    }

    /// Whether a data object of `tag` elements may be assigned
    pub fn accepts_tag(&self, tag: TypeTag) -> bool {
        self.setter == Setter::Data && (self.accepts.is_empty() || self.accepts.contains(&tag))
    }
}

fn array_element_tags(doc: &str) -> Result<Vec<TypeTag>> {
    let mut tags = Vec::new();
    for alternative in doc.split('/').map(str::trim) {
        let kinds: &[TypeTag] = match alternative {
            "float[]" => &[TypeTag::Float],
            "int32[]" => &[TypeTag::Int],
            "vec2f[]" => &[TypeTag::Float2],
            "vec3f[]" => &[TypeTag::Float3],
            "vec3f(a)[]" => &[TypeTag::Float3, TypeTag::Float3A],
            "vec3fa[]" => &[TypeTag::Float3A],
            "vec4f[]" => &[TypeTag::Float4],
            "vec3i(a)[]" => &[TypeTag::Int3, TypeTag::Int4],
            "vec4i[]" => &[TypeTag::Int4],
            "OSPLight[]" => &[TypeTag::Light],
            other => {
                return Err(Error::UnsupportedParameter(format!(
                    "unknown array type {:?}",
                    other
                )))
            }
        };
        for kind in kinds {
            if !tags.contains(kind) {
                tags.push(*kind);
            }
        }
    }
    Ok(tags)
}

/// Map a host attribute name to the native parameter name (`vertex__color`
/// becomes `vertex.color`).
pub fn normalize_name(name: &str) -> Result<String> {
    if !name.is_ascii() {
        return Err(Error::InvalidArgument(format!(
            "parameter name {:?} is not ASCII",
            name
        )));
    }
    Ok(name.replace("__", "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_types() {
        assert_eq!(ParamType::parse("bool").unwrap().setter(), Setter::Int1);
        assert_eq!(ParamType::parse("float").unwrap().setter(), Setter::Float1);
        assert_eq!(ParamType::parse("vec2f").unwrap().setter(), Setter::Float2);
        assert_eq!(ParamType::parse("vec3f(a)").unwrap().setter(), Setter::Float3);
        assert_eq!(ParamType::parse("OSPCamera").unwrap().setter(), Setter::Object);
        assert_eq!(ParamType::parse("string").unwrap().setter(), Setter::Unsupported);
        assert!(ParamType::parse("quaternion").is_err());
    }

    #[test]
    fn test_array_types() {
        let vertex = ParamType::parse("vec3f(a)[]").unwrap();
        assert_eq!(vertex.setter(), Setter::Data);
        assert_eq!(vertex.accepts(), &[TypeTag::Float3, TypeTag::Float3A]);
        assert!(!vertex.accepts_tag(TypeTag::Float4));

        let color = ParamType::parse("vec4f[] / vec3f(a)[]").unwrap();
        assert!(color.accepts_tag(TypeTag::Float4));
        assert!(color.accepts_tag(TypeTag::Float3A));

        let lights = ParamType::parse("OSPLight[]").unwrap();
        assert_eq!(lights.accepts(), &[TypeTag::Light]);

        let any = ParamType::parse("OSPData").unwrap();
        assert!(any.accepts_tag(TypeTag::Int3));
    }

    #[test]
    fn test_variadic_float() {
        let setter = ParamType::parse("float / vec3f / vec4f").unwrap().setter();
        assert_eq!(setter.for_arity(1).unwrap(), Setter::Float1);
        assert_eq!(setter.for_arity(3).unwrap(), Setter::Float3);
        assert_eq!(setter.for_arity(4).unwrap(), Setter::Float4);
        assert!(setter.for_arity(2).is_err());
        assert_eq!(setter.symbol(), None);
        assert_eq!(setter.for_arity(4).unwrap().symbol(), Some("ospSet4f"));
    }

    #[test]
    fn test_bind_values() {
        let pos = Setter::Float3
            .bind(&[ParamArg::Int(0), ParamArg::Float(0.5), ParamArg::Int(-1)])
            .unwrap();
        assert_eq!(pos, ParamValue::Float3([0.0, 0.5, -1.0]));

        assert_eq!(
            Setter::Int1.bind(&[ParamArg::Bool(true)]).unwrap(),
            ParamValue::Int(1)
        );
        assert_eq!(
            Setter::FloatVariadic.bind(&[ParamArg::Float(0.5)]).unwrap(),
            ParamValue::Float(0.5)
        );

        let camera = RawHandle::from_addr(0x40);
        assert_eq!(
            Setter::Object.bind(&[ParamArg::Handle(camera)]).unwrap(),
            ParamValue::Object(camera)
        );
    }

    #[test]
    fn test_bind_rejects_bad_args() {
        assert!(Setter::Object.bind(&[ParamArg::Int(1)]).is_err());
        assert!(Setter::Int1.bind(&[ParamArg::Int(i64::MAX)]).is_err());
        assert!(Setter::Float2.bind(&[ParamArg::Float(1.0)]).is_err());
        assert!(Setter::Unsupported.bind(&[ParamArg::Int(1)]).is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("vertex__color").unwrap(), "vertex.color");
        assert_eq!(normalize_name("bgColor").unwrap(), "bgColor");
        assert!(normalize_name("färbe").is_err());
    }
}
