pub mod deadline;

pub mod file_io;

pub mod poller;

pub mod time;

#[cfg(test)]
mod deadline_test;
#[cfg(test)]
mod file_io_test;
#[cfg(test)]
mod poller_test;
