//! Declarative macros for dispatching on compile-time configuration.
//!
//! This crate has no dependencies and no runtime content: it only provides
//! `macro_rules!` plumbing used by the other crates in the workspace to pick
//! between a handful of mutually exclusive implementations (`std` vs `no_std`
//! fallback, `web` vs native, specific target architectures, ...) without
//! repeating the same `#[cfg(...)]` gate on every item in a block.
#![no_std]

/// Declares one or more named aliases for a `#[cfg(...)]` predicate.
///
/// ```ignore
/// define_alias! {
///     #[cfg(feature = "std")] => std,
///     #[cfg(all(target_arch = "wasm32", feature = "web"))] => web,
/// }
/// ```
///
/// Each alias becomes a macro (`std!`, `web!`, ...) that can be used three ways:
///
/// - `std! { item* }` emits the items only when the predicate holds.
/// - `std! { if { item* } else { item* } }` picks one branch of items.
/// - Inside [`switch!`], `path::to::std => { ... }` as one of the arms.
///
/// Aliases are private to the module they are defined in; re-export with
/// `pub(crate) use` or `pub use` as needed, the same way one would for any
/// other item.
#[macro_export]
macro_rules! define_alias {
    ($(#[cfg($($pred:tt)*)] => $name:ident),* $(,)?) => {
        $(
            $crate::__define_one_alias! { ($($pred)*) $name }
        )*
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __define_one_alias {
    (($($pred:tt)*) $name:ident) => {
        macro_rules! $name {
            (@items { $($t:item)* } else { $($rest:tt)* }) => {
                $(#[cfg($($pred)*)] $t)*
                #[cfg(not($($pred)*))]
                $crate::switch! { $($rest)* }
            };
            (@expr { $($t:tt)* } else { $($rest:tt)* }) => {
                match () {
                    #[cfg($($pred)*)]
                    () => { $($t)* }
                    #[cfg(not($($pred)*))]
                    () => { $crate::switch! { $($rest)* } }
                }
            };
            (if { $($t:item)* } else { $($f:item)* }) => {
                $(#[cfg($($pred)*)] $t)*
                $(#[cfg(not($($pred)*))] $f)*
            };
            ($($t:item)*) => {
                $(#[cfg($($pred)*)] $t)*
            };
        }
        pub use $name;
    };
}

/// Picks exactly one branch out of several, gated either by a named alias
/// from [`define_alias!`] or by a raw `#[cfg(...)]` predicate.
///
/// ```ignore
/// switch! {
///     crate::cfg::std => { pub use std::sync::Mutex; }
///     _ => { mod __fallback; pub use __fallback::Mutex; }
/// }
/// ```
///
/// Arms are tried top to bottom; the first whose predicate holds wins. A
/// final `_ => { ... }` arm is required unless every other arm's negation
/// is already exhaustive. Both item sequences (`mod`, `use`, `pub use`, ...)
/// and arbitrary expressions/statements (including a bare tail expression or
/// an early `return`) are supported as arm bodies.
#[macro_export]
macro_rules! switch {
    () => {};
    (, $($rest:tt)*) => {
        $crate::switch! { $($rest)* }
    };
    (#[cfg($($m:tt)*)] => { $($t:item)* } $($rest:tt)*) => {
        $(#[cfg($($m)*)] $t)*
        #[cfg(not($($m)*))]
        $crate::switch! { $($rest)* }
    };
    (#[cfg($($m:tt)*)] => { $($t:tt)* } $($rest:tt)*) => {
        match () {
            #[cfg($($m)*)]
            () => { $($t)* }
            #[cfg(not($($m)*))]
            () => { $crate::switch! { $($rest)* } }
        }
    };
    ($pred:path => { $($t:item)* } $($rest:tt)*) => {
        $pred! { @items { $($t)* } else { $($rest)* } }
    };
    ($pred:path => { $($t:tt)* } $($rest:tt)*) => {
        $pred! { @expr { $($t)* } else { $($rest)* } }
    };
    (_ => { $($t:tt)* } $(,)?) => {
        $($t)*
    };
}
