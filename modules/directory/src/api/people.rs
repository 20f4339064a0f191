use contractkit::{
    Contract, ContractDecl, DomainFailure, HandlerRegistry, HttpLogging, HttpLoggingFields,
    OperationArgs, OperationDecl, Reply,
};
use std::sync::Arc;

use crate::contract::{
    client::PeopleApi,
    model::{PeopleQuery, Person},
};

impl Contract for dyn PeopleApi {
    const NAME: &'static str = "PeopleApi";

    fn declare() -> ContractDecl {
        ContractDecl::new(Self::NAME)
            .group_name("people")
            .tag("people")
            .require_authorization("user")
            .operation(OperationDecl::new("GetPeople").get("/people"))
            .operation(
                OperationDecl::new("SearchPeople")
                    .get("/people/search")
                    .query_param("firstName")
                    .query_param("lastName")
                    .query_param("company"),
            )
            .operation(
                OperationDecl::new("GetPeopleByCompany")
                    .get("/people/company/{company}")
                    .param("company"),
            )
            .operation(
                OperationDecl::new("GetPerson")
                    .get("/people/person/{id}")
                    .param("id")
                    .http_logging(HttpLogging::new(
                        HttpLoggingFields::REQUEST_PROPERTIES
                            | HttpLoggingFields::RESPONSE_STATUS_CODE
                            | HttpLoggingFields::DURATION,
                    )),
            )
            .operation(
                OperationDecl::new("CreatePerson")
                    .post("/people/person")
                    .body_param("person"),
            )
            .operation(
                OperationDecl::new("DeletePerson")
                    .delete("/people/person/{id}")
                    .param("id")
                    .require_authorization("admin"),
            )
            .operation(
                OperationDecl::new("UpdatePerson")
                    .put("/people/person")
                    .body_param("person"),
            )
    }

    fn handlers() -> HandlerRegistry<Self> {
        HandlerRegistry::new()
            .operation("GetPeople", |svc: Arc<dyn PeopleApi>, _args| async move {
                Reply::json(&svc.people().await)
            })
            .operation("SearchPeople", |svc: Arc<dyn PeopleApi>, args: OperationArgs| async move {
                let query = PeopleQuery {
                    first_name: args.optional_text("firstName").map(str::to_owned),
                    last_name: args.optional_text("lastName").map(str::to_owned),
                    company: args.optional_text("company").map(str::to_owned),
                };
                Reply::json(&svc.search_people(query).await)
            })
            .operation("GetPeopleByCompany", |svc: Arc<dyn PeopleApi>, args: OperationArgs| async move {
                Reply::json(&svc.people_by_company(args.text("company")?).await)
            })
            .operation("GetPerson", |svc: Arc<dyn PeopleApi>, args: OperationArgs| async move {
                let person = svc
                    .person(args.text("id")?)
                    .await
                    .map_err(DomainFailure::from)?;
                Reply::json(&person)
            })
            .operation("CreatePerson", create_person)
            .operation("DeletePerson", delete_person)
            .operation("UpdatePerson", update_person)
    }
}

async fn create_person(svc: Arc<dyn PeopleApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    let person: Person = args.json("person")?;
    svc.create_person(person)
        .await
        .map_err(DomainFailure::from)?;
    Ok(Reply::Empty)
}

async fn delete_person(svc: Arc<dyn PeopleApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    svc.delete_person(args.text("id")?).await;
    Ok(Reply::Empty)
}

async fn update_person(svc: Arc<dyn PeopleApi>, args: OperationArgs) -> anyhow::Result<Reply> {
    let person: Person = args.json("person")?;
    svc.update_person(person)
        .await
        .map_err(DomainFailure::from)?;
    Ok(Reply::Empty)
}
