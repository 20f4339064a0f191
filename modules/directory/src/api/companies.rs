use contractkit::{
    Contract, ContractDecl, DomainFailure, HandlerRegistry, OperationArgs, OperationDecl, Reply,
};
use std::sync::Arc;

use crate::contract::{client::CompanyApi, model::Company};

impl Contract for dyn CompanyApi {
    const NAME: &'static str = "CompanyApi";

    fn declare() -> ContractDecl {
        ContractDecl::new(Self::NAME)
            .description("API to access companies")
            .group_name("companies")
            .order(1)
            .tag("companies")
            .operation(
                OperationDecl::new("GetCompanies")
                    .get("/companies")
                    .description("Get companies")
                    .summary("Get all companies"),
            )
            .operation(
                OperationDecl::new("GetCompany")
                    .get("/companies/{id}")
                    .summary("Get company by id"),
            )
            .operation(
                OperationDecl::new("CreateCompany")
                    .post("/companies")
                    .body_param("company")
                    .summary("Create a new company"),
            )
            .operation(
                OperationDecl::new("DeleteCompany")
                    .delete("/companies")
                    .param("id")
                    .summary("Delete an existing company"),
            )
            .operation(
                OperationDecl::new("UpdateCompany")
                    .put("/companies")
                    .body_param("company")
                    .summary("Update an existing company"),
            )
            .operation(
                OperationDecl::new("Compact")
                    .post("/companies/compact")
                    .ignore(),
            )
    }

    fn handlers() -> HandlerRegistry<Self> {
        HandlerRegistry::new()
            .operation("GetCompanies", |svc: Arc<dyn CompanyApi>, _args| async move {
                Reply::json(&svc.companies().await)
            })
            .operation("GetCompany", |svc: Arc<dyn CompanyApi>, args: OperationArgs| async move {
                let company = svc
                    .company(args.text("id")?)
                    .await
                    .map_err(DomainFailure::from)?;
                Reply::json(&company)
            })
            .operation("CreateCompany", create_company)
            .operation("DeleteCompany", delete_company)
            .operation("UpdateCompany", update_company)
    }
}

async fn create_company(svc: Arc<dyn CompanyApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    let company: Company = args.json("company")?;
    svc.create_company(company)
        .await
        .map_err(DomainFailure::from)?;
    Ok(Reply::Empty)
}

async fn delete_company(svc: Arc<dyn CompanyApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    svc.delete_company(args.text("id")?).await;
    Ok(Reply::Empty)
}

async fn update_company(svc: Arc<dyn CompanyApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    let company: Company = args.json("company")?;
    svc.update_company(company)
        .await
        .map_err(DomainFailure::from)?;
    Ok(Reply::Empty)
}
