//! Filesystem, archive-staging, and process-isolation primitives the
//! installer core treats as external collaborators: `stage`
//! (archive extraction), `Keg::link`/`unlink`/`optlink` plus install-name
//! relocation, and the pristine-environment child-process spawner the
//! build driver uses.

pub mod checksum;
pub mod extract;
pub mod fs;
pub mod json_io;
pub mod keg;
pub mod process;
pub mod uninstall;

pub use checksum::{verify_checksum_async, verify_checksum_sync};
pub use extract::stage;
pub use json_io::{read_json_sync, write_json_sync};
pub use keg::{fix_install_names, link, optlink, unlink, LinkConflict};
pub use process::spawn_pristine;
pub use uninstall::remove_path;
