// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory stand-ins for the host, the ledger store and the storage
//! relation.

mod logger;

pub use self::{
    fakes::{FakeHost, FakeProvisioner, FakeRelation, MemStore, MemStoreProvider},
    logger::init_logger,
};
