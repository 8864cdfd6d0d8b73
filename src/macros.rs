//! Macros for declaring state identifier enums.

/// Generate a state id enum together with its [`StateId`] impl.
///
/// The first variant is the reserved "no state" sentinel; every variant
/// after it names one state. The enum derives `Clone`, `Copy`,
/// `PartialEq`, `Eq` and `Debug`.
///
/// [`StateId`]: crate::StateId
///
/// # Example
///
/// ```
/// use strata::{state_ids, StateId};
///
/// state_ids! {
///     pub enum DoorId {
///         None,
///         Open,
///         Closed,
///     }
/// }
///
/// assert!(DoorId::None.is_null());
/// assert_eq!(DoorId::NULL, DoorId::None);
/// ```
#[macro_export]
macro_rules! state_ids {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $null:ident
            $(, $variant:ident)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        $vis enum $name {
            $null
            $(, $variant)*
        }

        impl $crate::StateId for $name {
            const NULL: Self = Self::$null;
        }
    };
}
