use crate::{alerts::AlertReport, connection::ConnectionStatus, types::RemoteState};

pub trait DisplayAdapter {
    fn render(&mut self, state: &RemoteState, alerts: &AlertReport);

    fn connection_changed(&mut self, _status: &ConnectionStatus) {}
}
