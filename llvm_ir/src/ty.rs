use std::fmt;

/// An IR-level type. Pointer and array types nest; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    I1,
    I8,
    I32,
    Void,
    Label,
    Pointer(Box<Type>),
    Array(usize, Box<Type>),
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
    },
}

impl Type {
    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    pub fn array_of(len: usize, element: Type) -> Type {
        Type::Array(len, Box::new(element))
    }

    pub fn function(ret: Type, params: Vec<Type>) -> Type {
        Type::Function {
            ret: Box::new(ret),
            params,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_i1(&self) -> bool {
        matches!(self, Type::I1)
    }

    pub fn is_i8(&self) -> bool {
        matches!(self, Type::I8)
    }

    pub fn is_i32(&self) -> bool {
        matches!(self, Type::I32)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    /// The pointee of a pointer type, or `None` for any other type.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    /// The element type of an array type, or `None` for any other type.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(_, element) => Some(element),
            _ => None,
        }
    }

    /// The return type of a function type, or `None` for any other type.
    pub fn return_ty(&self) -> Option<&Type> {
        match self {
            Type::Function { ret, .. } => Some(ret),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I1 => f.write_str("i1"),
            Type::I8 => f.write_str("i8"),
            Type::I32 => f.write_str("i32"),
            Type::Void => f.write_str("void"),
            Type::Label => f.write_str("label"),
            Type::Pointer(pointee) => write!(f, "{pointee}*"),
            Type::Array(len, element) => write!(f, "[{len} x {element}]"),
            Type::Function { ret, params } => {
                write!(f, "{ret} (")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    param.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(
            Type::pointer_to(Type::array_of(3, Type::I32)),
            Type::pointer_to(Type::array_of(3, Type::I32)),
        );
        assert_ne!(
            Type::pointer_to(Type::I32),
            Type::pointer_to(Type::array_of(3, Type::I32)),
        );
    }

    #[test]
    fn displays_nested_types() {
        let ty = Type::pointer_to(Type::array_of(2, Type::array_of(3, Type::I32)));
        assert_eq!(ty.to_string(), "[2 x [3 x i32]]*");
    }
}
