//! Call signatures and type-erased argument lists.
//!
//! Signals and slots are statically typed by a tuple of arguments. The
//! [`Proxy`](crate::Proxy) has to pair members whose types are only known at
//! runtime, so every argument tuple can describe itself as a [`Signature`] and
//! be flattened into [`ErasedArgs`].
//!
//! # Matching Rule
//!
//! A slot taking `N` arguments accepts a signal emitting `M >= N` arguments
//! when the first `N` argument types are identical. Trailing signal
//! arguments are dropped on delivery.
//!
//! ```
//! use sight_com::args::SlotArgs;
//!
//! let slot = <(i32, i32)>::signature();
//! assert!(slot.accepts(&<(i32, i32, char)>::signature()));
//! assert!(!slot.accepts(&<(i32,)>::signature()));
//! assert!(!slot.accepts(&<(i64, i32)>::signature()));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

type ErasedValue = Arc<dyn Any + Send + Sync>;

/// A type-erased argument list.
///
/// Values are reference counted, so cloning an `ErasedArgs` to hand it to
/// several slots does not clone the arguments themselves.
#[derive(Clone, Default)]
pub struct ErasedArgs {
    values: Vec<ErasedValue>,
}

impl ErasedArgs {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Arc::new(value));
    }

    /// Number of values in the list.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the value at `index` if it has type `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        let value: &(dyn Any + Send + Sync) = self.values.get(index)?.as_ref();
        value.downcast_ref::<T>()
    }
}

impl fmt::Debug for ErasedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedArgs")
            .field("len", &self.values.len())
            .finish()
    }
}

/// The runtime description of an argument tuple.
#[derive(Clone)]
pub struct Signature {
    types: Vec<TypeId>,
    names: Vec<&'static str>,
}

impl Signature {
    fn from_parts(types: Vec<TypeId>, names: Vec<&'static str>) -> Self {
        Self { types, names }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.types.len()
    }

    /// Readable argument type names, in order.
    pub fn type_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Whether a slot with this signature can receive an emission with the
    /// `emitted` signature.
    pub fn accepts(&self, emitted: &Signature) -> bool {
        self.arity() <= emitted.arity()
            && self
                .types
                .iter()
                .zip(&emitted.types)
                .all(|(expected, actual)| expected == actual)
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.names.join(", "))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature{self}")
    }
}

/// Argument tuples usable as a signal or slot signature.
///
/// Implemented for tuples of up to six elements whose element types are
/// `Clone + Send + Sync + 'static`. Use `()` for signals without arguments
/// and `(T,)` for a single argument.
pub trait SlotArgs: Clone + Send + Sync + 'static {
    /// Number of arguments in the tuple.
    const ARITY: usize;

    /// Describe this tuple type.
    fn signature() -> Signature;

    /// Flatten the tuple into an erased list.
    fn into_erased(self) -> ErasedArgs;

    /// Rebuild the tuple from the first [`ARITY`](Self::ARITY) erased values.
    ///
    /// Returns `None` when there are too few values or a type differs.
    fn from_erased(args: &ErasedArgs) -> Option<Self>;
}

macro_rules! impl_slot_args {
    (@count) => { 0usize };
    (@count $head:ident $($tail:ident)*) => { 1usize + impl_slot_args!(@count $($tail)*) };
    ($($name:ident : $idx:tt),*) => {
        impl<$($name),*> SlotArgs for ($($name,)*)
        where
            $($name: Clone + Send + Sync + 'static),*
        {
            const ARITY: usize = impl_slot_args!(@count $($name)*);

            fn signature() -> Signature {
                Signature::from_parts(
                    vec![$(TypeId::of::<$name>()),*],
                    vec![$(std::any::type_name::<$name>()),*],
                )
            }

            #[allow(unused_mut)]
            fn into_erased(self) -> ErasedArgs {
                let mut args = ErasedArgs::with_capacity(Self::ARITY);
                $(args.push(self.$idx);)*
                args
            }

            #[allow(unused_variables)]
            fn from_erased(args: &ErasedArgs) -> Option<Self> {
                Some(($(args.get::<$name>($idx)?.clone(),)*))
            }
        }
    };
}

impl_slot_args!();
impl_slot_args!(A: 0);
impl_slot_args!(A: 0, B: 1);
impl_slot_args!(A: 0, B: 1, C: 2);
impl_slot_args!(A: 0, B: 1, C: 2, D: 3);
impl_slot_args!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_slot_args!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert_eq!(<()>::ARITY, 0);
        assert_eq!(<(i32,)>::ARITY, 1);
        assert_eq!(<(i32, String, char)>::ARITY, 3);
        assert_eq!(<(u8, u8, u8, u8, u8, u8)>::signature().arity(), 6);
    }

    #[test]
    fn test_accepts_prefix() {
        let sum = <(i32, i32)>::signature();
        assert!(sum.accepts(&<(i32, i32)>::signature()));
        assert!(sum.accepts(&<(i32, i32, char)>::signature()));
        assert!(<()>::signature().accepts(&<(String,)>::signature()));
    }

    #[test]
    fn test_rejects_shorter_or_mismatched() {
        let sum = <(i32, i32)>::signature();
        assert!(!sum.accepts(&<(i32,)>::signature()));
        assert!(!sum.accepts(&<(i32, u32)>::signature()));
        // No implicit widening: i32 does not match i64.
        assert!(!<(i64,)>::signature().accepts(&<(i32,)>::signature()));
        assert!(!<(String,)>::signature().accepts(&<(i32, i32)>::signature()));
    }

    #[test]
    fn test_from_erased_takes_prefix() {
        let erased = (8, 2, 'x').into_erased();
        assert_eq!(erased.len(), 3);

        assert_eq!(<(i32, i32)>::from_erased(&erased), Some((8, 2)));
        assert_eq!(<(i32,)>::from_erased(&erased), Some((8,)));
        assert_eq!(<()>::from_erased(&erased), Some(()));
        assert_eq!(<(i32, char)>::from_erased(&erased), None);
        assert_eq!(<(i32, i32, char, u8)>::from_erased(&erased), None);
    }

    #[test]
    fn test_erased_get() {
        let erased = ("hello".to_string(), 7u64).into_erased();
        assert_eq!(erased.get::<String>(0).map(String::as_str), Some("hello"));
        assert_eq!(erased.get::<u64>(1), Some(&7));
        assert_eq!(erased.get::<u32>(1), None);
        assert_eq!(erased.get::<u64>(2), None);
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(<()>::signature().to_string(), "()");
        assert_eq!(<(i32, char)>::signature().to_string(), "(i32, char)");
    }
}
