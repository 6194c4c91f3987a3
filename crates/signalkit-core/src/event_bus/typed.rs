//! Strongly-typed channels.
//!
//! A [`Channel`] fixes its argument tuple at compile time. Callbacks built
//! with [`Callback::typed`] declare exactly that tuple's signature, so they
//! always pass listen-time validation, and [`EventBus::emit`](super::EventBus::emit)
//! only accepts the matching tuple.
//!
//! ```rust,ignore
//! signalkit_core::channel! {
//!     /// Player took damage
//!     pub Damaged in "Combat": "Player took damage" => (i64, String)
//! }
//!
//! bus.register::<Damaged>();
//! let on_damaged = Callback::typed::<Damaged, _, _>(&hud, "on_damaged", |hud, (amount, source)| {
//!     hud.flash(amount, &source);
//! });
//! bus.listen(Damaged::id(), on_damaged, SubscribeFlags::NONE, vec![]);
//! bus.emit::<Damaged>((12, "trap".to_string()));
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use super::channel::{ChannelDescriptor, ChannelId};
use super::subscription::{Callback, Target};
use crate::value::{Param, ShapeError, Signature, Value, ValueType};

/// A Rust type that travels through the bus as a single [`Value`]
pub trait Argument: Sized + 'static {
    /// Declared type of a parameter holding this argument
    fn value_type() -> ValueType;
    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl Argument for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl Argument for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl Argument for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn into_value(self) -> Value {
        Value::Int(self.into())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| i32::try_from(i).ok())
    }
}

impl Argument for u32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn into_value(self) -> Value {
        Value::Int(self.into())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| u32::try_from(i).ok())
    }
}

impl Argument for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl Argument for f32 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    fn into_value(self) -> Value {
        Value::Float(self.into())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float().map(|f| f as f32)
    }
}

impl Argument for String {
    fn value_type() -> ValueType {
        ValueType::Str
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl Argument for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// A fixed tuple of [`Argument`]s
pub trait Arguments: Sized + 'static {
    fn signature() -> Signature;
    fn into_values(self) -> Vec<Value>;
    fn from_values(values: &[Value]) -> Option<Self>;
}

impl Arguments for () {
    fn signature() -> Signature {
        Signature::new()
    }

    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }

    fn from_values(_values: &[Value]) -> Option<Self> {
        Some(())
    }
}

macro_rules! impl_arguments {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Argument),+> Arguments for ($($name,)+) {
            fn signature() -> Signature {
                Signature::from(vec![
                    $(Param::new(
                        concat!("arg", stringify!($idx)),
                        <$name as Argument>::value_type(),
                    )),+
                ])
            }

            fn into_values(self) -> Vec<Value> {
                vec![$(self.$idx.into_value()),+]
            }

            fn from_values(values: &[Value]) -> Option<Self> {
                Some(($(<$name as Argument>::from_value(values.get($idx)?)?,)+))
            }
        }
    };
}

impl_arguments!(A: 0);
impl_arguments!(A: 0, B: 1);
impl_arguments!(A: 0, B: 1, C: 2);
impl_arguments!(A: 0, B: 1, C: 2, D: 3);

/// A statically declared event kind
pub trait Channel: 'static {
    /// Unique channel name, also its id.
    const NAME: &'static str;
    /// Discovery category.
    const CATEGORY: &'static str;
    const DESCRIPTION: &'static str = "";

    /// Argument tuple every dispatch carries.
    type Args: Arguments;

    fn id() -> ChannelId {
        ChannelId::from(Self::NAME)
    }

    /// Registration entry for this channel
    fn descriptor() -> ChannelDescriptor {
        ChannelDescriptor::new(Self::id(), Self::CATEGORY)
            .with_description(Self::DESCRIPTION)
            .with_signature(<Self::Args as Arguments>::signature())
    }
}

impl Callback {
    /// Callback on `target` that receives the decoded argument tuple of `C`.
    ///
    /// Values that pass the parameter check but do not decode (a negative
    /// int for a `u32` slot) are rejected before the call.
    pub fn typed<C, T, F>(target: &Arc<T>, entry: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        C: Channel,
        T: Target,
        F: Fn(&T, C::Args) + Send + Sync + 'static,
    {
        Callback::method(
            target,
            entry,
            <C::Args as Arguments>::signature(),
            move |target: &T, args: &[Value]| {
                if let Some(decoded) = <C::Args as Arguments>::from_values(args) {
                    f(target, decoded);
                }
            },
        )
        .with_guard(|args: &[Value]| match <C::Args as Arguments>::from_values(args) {
            Some(_) => Ok(()),
            None => Err(ShapeError::Undecodable {
                target: std::any::type_name::<C::Args>().to_string(),
            }),
        })
    }
}

/// Declare a typed channel.
///
/// ```rust,ignore
/// channel! {
///     /// Emitted once a level is loaded
///     pub LevelLoaded in "World": "A level finished loading" => (String, u32)
/// }
/// ```
#[macro_export]
macro_rules! channel {
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident in $category:literal $(: $description:literal)? => ($($arg:ty),* $(,)?)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::Channel for $name {
            const NAME: &'static str = stringify!($name);
            const CATEGORY: &'static str = $category;
            $(const DESCRIPTION: &'static str = $description;)?
            type Args = ($($arg,)*);
        }
    };
}
