/*! Integration tests for Fieldbook.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - backend: Conformance tests run against every storage backend
 * - document: Change tracking and notes on wrapped form data
 * - queue: Transaction atomicity, aborts, store failures and concurrency
 * - repository: Saving, listing and clearing records end to end
 * - order: Column order reconstruction over evolving forms
 *
 * Set TEST_BACKEND=sqlite to run the queue and repository suites on SQLite.
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fieldbook=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod backend;
mod document;
mod helpers;
mod order;
mod repository;
