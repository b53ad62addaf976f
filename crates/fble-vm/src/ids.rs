//! Thread identifiers (spec §4.F/§5): one per root program execution
//! and one per `Fork`ed child.

use fble_common::define_id;

define_id! {
    pub struct ThreadId;
}
