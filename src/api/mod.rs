// HTTP surface consumed by the browser dashboard.

pub mod rest;
