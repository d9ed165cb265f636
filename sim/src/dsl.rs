/// This macro helps defining the combinational devices of the datapath.
///
/// Every unit declares its input and output ports. The macro generates
///
/// 1. `unit_in::Name` and `unit_out::Name`, the port structs of each unit;
/// 2. `UnitOutputSignal`, the outputs of all units in one cycle, which the
///    machine fills while propagating;
/// 3. a zero-sized `Name` type whose `trigger` evaluates the unit body with
///    its input ports bound by value and its output ports bound by `&mut`.
///
/// Units hold no state. Anything that survives a clock edge lives in a
/// [`crate::framework::Clocked`] element owned by the machine, so evaluating
/// a unit twice in the same cycle always gives the same outputs.
///
/// During a CPU cycle,
/// 1. the clocked elements expose the values committed at the last edge;
/// 2. signals flow from those values through the units, in the order the
///    machine triggers them;
/// 3. the values that must survive the cycle are driven into clocked
///    elements, and become visible after the edge.
#[macro_export]
macro_rules! define_units {
    ($(
        $(#[$att:meta])*
        $unit_name:ident $unit_short_name:ident {
            .input( $($(#[$input_att:meta])* $iname:ident : $itype:ty),* $(,)? )
            .output( $($(#[$output_att:meta])* $oname:ident : $otype:ty),* $(,)? )
        } $body:block
    )*) => {
        /// Input signals of units
        pub mod unit_in {
            #![allow(unused_imports)]
            use super::*;
            $(#[derive(Default, Debug, Clone, serde::Serialize)]
            pub struct $unit_name {
                $( $(#[$input_att])* pub $iname: $itype, )*
            })*
        }
        /// Output signals of units
        pub mod unit_out {
            #![allow(unused_imports)]
            use super::*;
            $(#[derive(Default, Debug, Clone, serde::Serialize)]
            pub struct $unit_name {
                $( $(#[$output_att])* pub $oname: $otype, )*
            })*
        }

        #[derive(Default, Debug, Clone, serde::Serialize)]
        pub struct UnitOutputSignal {
            $(pub $unit_short_name: unit_out::$unit_name),*
        }

        $(
        $(#[$att])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $unit_name;

        impl $unit_name {
            #[allow(unused)]
            pub fn trigger(
                inputs: unit_in::$unit_name,
                outputs: &mut unit_out::$unit_name,
            ) {
                let unit_in::$unit_name { $( $iname, )* } = inputs;
                let unit_out::$unit_name { $( $oname, )* } = outputs;
                $body
            }
        }
        )*
    };
}

/// Test whether `sig` is one of `choice`.
pub(crate) fn mtc<T: Eq>(sig: T, choice: impl AsRef<[T]>) -> bool {
    choice.as_ref().iter().any(|c| *c == sig)
}
