//! [`AthenaApi`] implementation backed by the AWS SDK.

use crate::error::RemoteError;
use crate::transport::messages::{
    ColumnInfo, ExecutionState, QueryStatus, ResultPage, StartQueryRequest, WorkgroupState,
};
use crate::transport::protocol::AthenaApi;
use crate::workgroup::Workgroup;
use async_trait::async_trait;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{
    QueryExecutionContext, ResultConfiguration, Tag, WorkGroupConfiguration,
    WorkGroupState as SdkWorkGroupState,
};
use aws_sdk_athena::Client;

/// Remote client for Amazon Athena.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct AthenaClient {
    client: Client,
}

impl AthenaClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a loaded SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn request_error<E>(operation: &str, err: E) -> RemoteError
where
    E: std::error::Error,
{
    RemoteError::request(operation, DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl AthenaApi for AthenaClient {
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String, RemoteError> {
        let context = QueryExecutionContext::builder()
            .database(&request.database)
            .build();
        let result_config = ResultConfiguration::builder()
            .output_location(&request.output_location)
            .build();

        let output = self
            .client
            .start_query_execution()
            .query_string(&request.query)
            .query_execution_context(context)
            .result_configuration(result_config)
            .work_group(&request.workgroup)
            .send()
            .await
            .map_err(|e| request_error("StartQueryExecution", e))?;

        output
            .query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::malformed("StartQueryExecution", "missing query execution id"))
    }

    async fn get_query_status(&self, query_id: &str) -> Result<QueryStatus, RemoteError> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(|e| request_error("GetQueryExecution", e))?;

        let execution = output
            .query_execution()
            .ok_or_else(|| RemoteError::malformed("GetQueryExecution", "missing query execution"))?;
        let status = execution
            .status()
            .ok_or_else(|| RemoteError::malformed("GetQueryExecution", "missing status"))?;
        let state = status
            .state()
            .map(|s| ExecutionState::from_service(s.as_str()))
            .ok_or_else(|| RemoteError::malformed("GetQueryExecution", "missing state"))?;

        Ok(QueryStatus {
            query_id: execution
                .query_execution_id()
                .unwrap_or(query_id)
                .to_string(),
            state,
            state_change_reason: status.state_change_reason().map(str::to_string),
            statement_type: execution.statement_type().map(|t| t.as_str().to_string()),
            data_scanned_bytes: execution
                .statistics()
                .and_then(|stats| stats.data_scanned_in_bytes()),
        })
    }

    async fn get_results_page(
        &self,
        query_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage, RemoteError> {
        let output = self
            .client
            .get_query_results()
            .query_execution_id(query_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| request_error("GetQueryResults", e))?;

        let result_set = output.result_set();
        let columns = result_set
            .and_then(|rs| rs.result_set_metadata())
            .map(|meta| {
                meta.column_info()
                    .iter()
                    .map(|c| ColumnInfo::new(c.name(), c.r#type()))
                    .collect()
            });
        let rows = result_set
            .map(|rs| {
                rs.rows()
                    .iter()
                    .map(|row| {
                        row.data()
                            .iter()
                            .map(|datum| datum.var_char_value().map(str::to_string))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResultPage {
            columns,
            rows,
            next_token: output.next_token().map(str::to_string),
            update_count: output.update_count(),
        })
    }

    async fn stop_query(&self, query_id: &str) -> Result<(), RemoteError> {
        self.client
            .stop_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(|e| request_error("StopQueryExecution", e))?;
        Ok(())
    }

    async fn get_workgroup(&self, name: &str) -> Result<Option<WorkgroupState>, RemoteError> {
        let result = self.client.get_work_group().work_group(name).send().await;
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                // The service answers an unknown name with InvalidRequestException
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_invalid_request_exception())
                    .unwrap_or(false);
                if not_found {
                    return Ok(None);
                }
                return Err(request_error("GetWorkGroup", err));
            }
        };

        let state = output.work_group().and_then(|wg| wg.state());
        Ok(Some(match state {
            Some(SdkWorkGroupState::Enabled) => WorkgroupState::Enabled,
            _ => WorkgroupState::Disabled,
        }))
    }

    async fn create_workgroup(&self, workgroup: &Workgroup) -> Result<(), RemoteError> {
        let policy = workgroup.config();
        let configuration = WorkGroupConfiguration::builder()
            .bytes_scanned_cutoff_per_query(policy.bytes_scanned_cutoff_per_query)
            .enforce_work_group_configuration(policy.enforce_workgroup_configuration)
            .publish_cloud_watch_metrics_enabled(policy.publish_cloudwatch_metrics_enabled)
            .requester_pays_enabled(policy.requester_pays_enabled)
            .build();

        let mut request = self
            .client
            .create_work_group()
            .name(workgroup.name())
            .configuration(configuration);
        if !workgroup.tags().is_empty() {
            let tags = workgroup
                .tags()
                .iter()
                .map(|(key, value)| Tag::builder().key(key).value(value).build())
                .collect();
            request = request.set_tags(Some(tags));
        }

        request
            .send()
            .await
            .map_err(|e| request_error("CreateWorkGroup", e))?;
        Ok(())
    }
}
