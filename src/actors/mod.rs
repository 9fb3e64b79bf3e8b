pub mod dashboard;

pub use dashboard::{
    DashboardArgs, DashboardMessage, DashboardSupervisor, ExtendedResources, ResourceUpdate,
};
